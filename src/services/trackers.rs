// SPDX-License-Identifier: MIT

//! Tracker lifecycle coordination.
//!
//! Owns creation, default provisioning, and deletion of trackers, and keeps
//! the active-tracker selection from dangling when its tracker goes away.

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{GeneratedTrackerConfig, PresetKind, Tracker, TrackerType};
use crate::services::generation::{ConfigGenerator, GenerationOutcome};
use crate::services::images::ImageClient;
use crate::time_utils::now_rfc3339;
use dashmap::DashMap;
use futures_util::{stream, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Result of a custom-tracker creation attempt.
pub enum CustomCreate {
    Created(Tracker),
    /// The name didn't match a known concept; caller must supply a
    /// description before generation can proceed.
    NeedsDescription,
}

/// Result of a tracker deletion.
pub struct DeleteOutcome {
    pub entries_deleted: usize,
    /// Suggested new active tracker: another default-flagged tracker if one
    /// exists, else any remaining one. `None` means no trackers remain and
    /// the client should re-enter onboarding.
    pub replacement: Option<Tracker>,
}

pub struct TrackerService {
    db: FirestoreDb,
    generator: Arc<dyn ConfigGenerator>,
    images: Arc<ImageClient>,
    /// Per-user mutex so concurrent ensure-default calls don't both create.
    /// Best-effort: without a store-level uniqueness constraint a race across
    /// processes can still double-create.
    ensure_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TrackerService {
    pub fn new(db: FirestoreDb, generator: Arc<dyn ConfigGenerator>, images: Arc<ImageClient>) -> Self {
        Self {
            db,
            generator,
            images,
            ensure_locks: DashMap::new(),
        }
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<Tracker>> {
        self.db.get_trackers_for_user(user_id).await
    }

    pub async fn get(&self, user_id: &str, tracker_id: &str) -> Result<Tracker> {
        self.db
            .get_tracker(user_id, tracker_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tracker {}", tracker_id)))
    }

    /// Guarantee the user has at least one tracker, creating the default
    /// pain tracker on first use. Idempotent within this process.
    pub async fn ensure_default_tracker(&self, user_id: &str) -> Result<Tracker> {
        let lock = self
            .ensure_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let trackers = self.db.get_trackers_for_user(user_id).await?;
        if let Some(existing) = pick_active(&trackers) {
            return Ok(existing.clone());
        }

        let tracker = self
            .build_preset_tracker(user_id, PresetKind::Pain, true)
            .await?;
        tracing::info!(user_id, tracker_id = %tracker.id, "Provisioned default tracker");
        Ok(tracker)
    }

    /// Create a tracker from a built-in preset.
    pub async fn create_preset(&self, user_id: &str, kind: PresetKind) -> Result<Tracker> {
        self.build_preset_tracker(user_id, kind, false).await
    }

    /// Create a custom tracker with an AI-generated config.
    pub async fn create_custom(
        &self,
        user_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<CustomCreate> {
        let config = match self.generator.generate(name, description).await? {
            GenerationOutcome::NeedsDescription => return Ok(CustomCreate::NeedsDescription),
            GenerationOutcome::Config(config) => config,
        };

        let tracker = self
            .store_custom(user_id, name, Some(config))
            .await?;
        Ok(CustomCreate::Created(tracker))
    }

    /// Create a custom tracker with the generic config (no generation). Used
    /// when the user opts out after a generation failure.
    pub async fn create_custom_generic(&self, user_id: &str, name: &str) -> Result<Tracker> {
        self.store_custom(user_id, name, None).await
    }

    /// Delete a tracker and everything it owns, then pick a replacement for
    /// the active selection.
    pub async fn delete_tracker(&self, user_id: &str, tracker_id: &str) -> Result<DeleteOutcome> {
        // Verify ownership before touching anything.
        let _tracker = self.get(user_id, tracker_id).await?;

        let entries_deleted = self.db.delete_entries_for_tracker(user_id, tracker_id).await?;
        self.db.delete_tracker(tracker_id).await?;

        let remaining = self.db.get_trackers_for_user(user_id).await?;
        let replacement = pick_active(&remaining).cloned();

        tracing::info!(
            user_id,
            tracker_id,
            entries_deleted,
            remaining = remaining.len(),
            "Deleted tracker"
        );

        Ok(DeleteOutcome {
            entries_deleted,
            replacement,
        })
    }

    /// Drop ensure-default locks nobody is currently waiting on. Called
    /// periodically so the per-user map doesn't grow without bound.
    pub fn evict_idle_locks(&self) {
        self.ensure_locks
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Entry counts for every tracker, issued concurrently and awaited as a
    /// batch.
    pub async fn entry_counts(&self, user_id: &str) -> Result<Vec<(Tracker, usize)>> {
        let trackers = self.db.get_trackers_for_user(user_id).await?;
        let db = &self.db;

        let mut counted = stream::iter(trackers)
            .map(|tracker| async move {
                let count = db.entry_count(user_id, &tracker.id).await?;
                Ok::<_, AppError>((tracker, count))
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(Tracker, usize)>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        counted.sort_by(|a, b| a.0.created_at.cmp(&b.0.created_at));
        Ok(counted)
    }

    async fn build_preset_tracker(
        &self,
        user_id: &str,
        kind: PresetKind,
        is_default: bool,
    ) -> Result<Tracker> {
        let now = now_rfc3339();
        let tracker = Tracker {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: kind.display_name().to_string(),
            tracker_type: TrackerType::Preset,
            preset_id: Some(kind),
            icon: kind.icon().to_string(),
            color: kind.color().to_string(),
            is_default,
            generated_config: None,
            image_url: None,
            created_at: now.clone(),
            updated_at: now,
        };
        self.db.upsert_tracker(&tracker).await?;
        Ok(tracker)
    }

    async fn store_custom(
        &self,
        user_id: &str,
        name: &str,
        generated_config: Option<GeneratedTrackerConfig>,
    ) -> Result<Tracker> {
        let now = now_rfc3339();
        let tracker = Tracker {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            tracker_type: TrackerType::Custom,
            preset_id: None,
            icon: "sparkles".to_string(),
            color: "#8b5cf6".to_string(),
            is_default: false,
            generated_config,
            image_url: None,
            created_at: now.clone(),
            updated_at: now,
        };
        self.db.upsert_tracker(&tracker).await?;

        // Cosmetic; runs detached and never blocks creation.
        self.images.clone().spawn_for_tracker(
            self.db.clone(),
            user_id.to_string(),
            tracker.id.clone(),
            name.to_string(),
        );

        Ok(tracker)
    }
}

/// Active-tracker selection rule: prefer a default-flagged tracker, else the
/// oldest remaining one.
fn pick_active(trackers: &[Tracker]) -> Option<&Tracker> {
    trackers
        .iter()
        .find(|t| t.is_default)
        .or_else(|| trackers.first())
}
