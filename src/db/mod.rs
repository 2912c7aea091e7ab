// SPDX-License-Identifier: MIT

//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const TRACKERS: &str = "trackers";
    pub const ENTRIES: &str = "entries";
}
