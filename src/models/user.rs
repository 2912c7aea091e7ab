// SPDX-License-Identifier: MIT

//! User and session snapshots.

use serde::{Deserialize, Serialize};

/// Validated snapshot of an auth-provider identity.
///
/// The provider owns this data; we never mutate it, only replace the snapshot
/// on each validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Provider-issued user ID
    pub id: String,
    /// Email address (may be absent for some identity types)
    pub email: Option<String>,
}

/// Ephemeral session handed back by the auth provider.
///
/// Recreated on every validation pass; held in memory only, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    /// Provider-signed access token (JWT)
    pub access_token: Option<String>,
    /// When the access token expires (Unix timestamp, seconds)
    pub expires_at: Option<i64>,
}
