// SPDX-License-Identifier: MIT

//! Entry model.

use serde::{Deserialize, Serialize};

/// A dated observation logged against a tracker.
///
/// Owned by the tracker it references; deleting a tracker cascades to its
/// entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Entry ID (also used as document ID)
    pub id: String,
    pub user_id: String,
    pub tracker_id: String,
    /// When the observation happened (ISO 8601)
    pub timestamp: String,
    /// 1..10 severity/quality rating
    pub intensity: u8,
    pub locations: Vec<String>,
    pub notes: String,
    pub triggers: Vec<String>,
    pub hashtags: Vec<String>,
}
