// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Trackers (per-user tracker documents, including generated configs)
//! - Entries (logged observations, owned by their tracker)
//!
//! `new_mock()` backs the same API with an in-memory store so the service
//! layer and the HTTP surface can be exercised offline.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Entry, Tracker};
use dashmap::DashMap;
use std::sync::Arc;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// In-memory backing store for offline mode.
#[derive(Default)]
struct MemStore {
    trackers: DashMap<String, Tracker>,
    entries: DashMap<String, Entry>,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
    mem: Option<Arc<MemStore>>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
            mem: None,
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
            mem: None,
        })
    }

    /// Create an in-memory client for testing (offline mode).
    pub fn new_mock() -> Self {
        Self {
            client: None,
            mem: Some(Arc::new(MemStore::default())),
        }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Tracker Operations ──────────────────────────────────────

    /// Get a tracker by ID, scoped to its owner.
    pub async fn get_tracker(
        &self,
        user_id: &str,
        tracker_id: &str,
    ) -> Result<Option<Tracker>, AppError> {
        if let Some(mem) = &self.mem {
            return Ok(mem
                .trackers
                .get(tracker_id)
                .filter(|t| t.user_id == user_id)
                .map(|t| t.clone()));
        }

        let tracker: Option<Tracker> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TRACKERS)
            .obj()
            .one(tracker_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Ownership is enforced here so callers can't read across users.
        Ok(tracker.filter(|t| t.user_id == user_id))
    }

    /// Get all trackers for a user, oldest first.
    pub async fn get_trackers_for_user(&self, user_id: &str) -> Result<Vec<Tracker>, AppError> {
        if let Some(mem) = &self.mem {
            let mut trackers: Vec<Tracker> = mem
                .trackers
                .iter()
                .filter(|t| t.user_id == user_id)
                .map(|t| t.clone())
                .collect();
            trackers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            return Ok(trackers);
        }

        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::TRACKERS)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .order_by([("created_at", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a tracker.
    pub async fn upsert_tracker(&self, tracker: &Tracker) -> Result<(), AppError> {
        if let Some(mem) = &self.mem {
            mem.trackers.insert(tracker.id.clone(), tracker.clone());
            return Ok(());
        }

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TRACKERS)
            .document_id(&tracker.id)
            .object(tracker)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Attach a generated image URL to a tracker.
    pub async fn set_tracker_image(
        &self,
        user_id: &str,
        tracker_id: &str,
        image_url: &str,
    ) -> Result<(), AppError> {
        let Some(mut tracker) = self.get_tracker(user_id, tracker_id).await? else {
            // Tracker deleted while the image was generating; nothing to do.
            return Ok(());
        };
        tracker.image_url = Some(image_url.to_string());
        tracker.updated_at = crate::time_utils::now_rfc3339();
        self.upsert_tracker(&tracker).await
    }

    /// Delete a tracker document. Entries are deleted separately.
    pub async fn delete_tracker(&self, tracker_id: &str) -> Result<(), AppError> {
        if let Some(mem) = &self.mem {
            mem.trackers.remove(tracker_id);
            return Ok(());
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::TRACKERS)
            .document_id(tracker_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Entry Operations ────────────────────────────────────────

    /// Get an entry by ID, scoped to its owner.
    pub async fn get_entry(&self, user_id: &str, entry_id: &str) -> Result<Option<Entry>, AppError> {
        if let Some(mem) = &self.mem {
            return Ok(mem
                .entries
                .get(entry_id)
                .filter(|e| e.user_id == user_id)
                .map(|e| e.clone()));
        }

        let entry: Option<Entry> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ENTRIES)
            .obj()
            .one(entry_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(entry.filter(|e| e.user_id == user_id))
    }

    /// Get entries for a tracker, newest first, with pagination.
    pub async fn get_entries_for_tracker(
        &self,
        user_id: &str,
        tracker_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Entry>, AppError> {
        if let Some(mem) = &self.mem {
            let mut entries: Vec<Entry> = mem
                .entries
                .iter()
                .filter(|e| e.user_id == user_id && e.tracker_id == tracker_id)
                .map(|e| e.clone())
                .collect();
            entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            return Ok(entries
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect());
        }

        let user_id = user_id.to_string();
        let tracker_id = tracker_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ENTRIES)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("tracker_id").eq(tracker_id.clone()),
                ])
            })
            .order_by([("timestamp", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .offset(offset)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update an entry.
    pub async fn upsert_entry(&self, entry: &Entry) -> Result<(), AppError> {
        if let Some(mem) = &self.mem {
            mem.entries.insert(entry.id.clone(), entry.clone());
            return Ok(());
        }

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ENTRIES)
            .document_id(&entry.id)
            .object(entry)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a single entry.
    pub async fn delete_entry(&self, entry_id: &str) -> Result<(), AppError> {
        if let Some(mem) = &self.mem {
            mem.entries.remove(entry_id);
            return Ok(());
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::ENTRIES)
            .document_id(entry_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Count entries for a tracker.
    pub async fn entry_count(&self, user_id: &str, tracker_id: &str) -> Result<usize, AppError> {
        if let Some(mem) = &self.mem {
            return Ok(mem
                .entries
                .iter()
                .filter(|e| e.user_id == user_id && e.tracker_id == tracker_id)
                .count());
        }

        let user_id = user_id.to_string();
        let tracker_id = tracker_id.to_string();
        let entries: Vec<Entry> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ENTRIES)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("tracker_id").eq(tracker_id.clone()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(entries.len())
    }

    /// Delete all entries referencing a tracker. Returns the number deleted.
    pub async fn delete_entries_for_tracker(
        &self,
        user_id: &str,
        tracker_id: &str,
    ) -> Result<usize, AppError> {
        if let Some(mem) = &self.mem {
            let ids: Vec<String> = mem
                .entries
                .iter()
                .filter(|e| e.user_id == user_id && e.tracker_id == tracker_id)
                .map(|e| e.id.clone())
                .collect();
            for id in &ids {
                mem.entries.remove(id);
            }
            return Ok(ids.len());
        }

        let entries = self
            .get_entries_for_tracker(user_id, tracker_id, u32::MAX, 0)
            .await?;

        let count = entries.len();
        self.batch_delete(&entries, collections::ENTRIES, |entry: &Entry| {
            entry.id.clone()
        })
        .await?;

        tracing::debug!(tracker_id, count, "Deleted tracker entries");
        Ok(count)
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}
