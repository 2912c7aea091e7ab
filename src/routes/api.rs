// SPDX-License-Identifier: MIT

//! Protected API routes for trackers, entries, and stats.
//!
//! Every persistence failure is inspected for authorization-shaped error
//! text before it is surfaced: a stale credential masquerading as a data
//! error triggers a forced sign-out instead of a generic failure.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Entry, PresetKind, Tracker, TrackerConfig};
use crate::services::presets;
use crate::services::trackers::CustomCreate;
use crate::time_utils::{normalize_rfc3339, now_rfc3339};
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/trackers", get(list_trackers).post(create_tracker))
        .route("/api/trackers/ensure-default", post(ensure_default))
        .route(
            "/api/trackers/{id}",
            get(get_tracker).delete(delete_tracker),
        )
        .route("/api/trackers/{id}/config", get(tracker_config))
        .route("/api/trackers/{id}/entries", get(list_entries))
        .route("/api/entries", post(create_entry))
        .route("/api/entries/{id}", put(update_entry).delete(delete_entry))
        .route("/api/stats/trackers", get(tracker_stats))
}

/// Inspect a failed operation for an authorization-shaped store error and, if
/// matched, purge the session instead of surfacing a data error.
async fn guard_db<T>(
    state: &AppState,
    auth: &AuthUser,
    result: Result<T>,
) -> Result<T> {
    match result {
        Err(e) if e.is_authorization_shaped() => {
            tracing::warn!(
                user_id = %auth.user_id,
                error = %e,
                "Authorization-shaped store error, forcing sign-out"
            );
            state
                .sessions
                .force_sign_out(&auth.user_id, Some(&auth.access_token))
                .await;
            Err(AppError::Unauthorized)
        }
        other => other,
    }
}

// ─── Trackers ────────────────────────────────────────────────────────────────

async fn list_trackers(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Tracker>>> {
    let trackers = guard_db(&state, &auth, state.trackers.list(&auth.user_id).await).await?;
    Ok(Json(trackers))
}

#[derive(Deserialize, Validate)]
pub struct CreateTrackerRequest {
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    /// Present for preset trackers.
    #[serde(default)]
    pub preset_id: Option<PresetKind>,
    /// Free-text description for generation when the name alone is ambiguous.
    #[serde(default)]
    pub description: Option<String>,
    /// Skip generation and use the generic config.
    #[serde(default)]
    pub generic: bool,
}

#[derive(Serialize)]
pub struct CreateTrackerResponse {
    pub tracker: Option<Tracker>,
    /// True when the name wasn't recognized and a description is required.
    pub needs_description: bool,
}

async fn create_tracker(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateTrackerRequest>,
) -> Result<impl IntoResponse> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if let Some(kind) = body.preset_id {
        let tracker = guard_db(
            &state,
            &auth,
            state.trackers.create_preset(&auth.user_id, kind).await,
        )
        .await?;
        return Ok((
            StatusCode::CREATED,
            Json(CreateTrackerResponse {
                tracker: Some(tracker),
                needs_description: false,
            }),
        ));
    }

    if body.generic {
        let tracker = guard_db(
            &state,
            &auth,
            state
                .trackers
                .create_custom_generic(&auth.user_id, &body.name)
                .await,
        )
        .await?;
        return Ok((
            StatusCode::CREATED,
            Json(CreateTrackerResponse {
                tracker: Some(tracker),
                needs_description: false,
            }),
        ));
    }

    let outcome = guard_db(
        &state,
        &auth,
        state
            .trackers
            .create_custom(&auth.user_id, &body.name, body.description.as_deref())
            .await,
    )
    .await?;

    match outcome {
        CustomCreate::Created(tracker) => Ok((
            StatusCode::CREATED,
            Json(CreateTrackerResponse {
                tracker: Some(tracker),
                needs_description: false,
            }),
        )),
        CustomCreate::NeedsDescription => Ok((
            StatusCode::OK,
            Json(CreateTrackerResponse {
                tracker: None,
                needs_description: true,
            }),
        )),
    }
}

async fn ensure_default(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Tracker>> {
    let tracker = guard_db(
        &state,
        &auth,
        state.trackers.ensure_default_tracker(&auth.user_id).await,
    )
    .await?;
    Ok(Json(tracker))
}

async fn get_tracker(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Tracker>> {
    let tracker = guard_db(&state, &auth, state.trackers.get(&auth.user_id, &id).await).await?;
    Ok(Json(tracker))
}

#[derive(Serialize)]
pub struct DeleteTrackerResponse {
    pub entries_deleted: usize,
    /// Suggested new active tracker; `null` means none remain and the client
    /// should re-enter onboarding.
    pub replacement: Option<Tracker>,
}

async fn delete_tracker(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<DeleteTrackerResponse>> {
    let outcome = guard_db(
        &state,
        &auth,
        state.trackers.delete_tracker(&auth.user_id, &id).await,
    )
    .await?;
    Ok(Json(DeleteTrackerResponse {
        entries_deleted: outcome.entries_deleted,
        replacement: outcome.replacement,
    }))
}

/// Fully resolved, ready-to-render config for a tracker.
async fn tracker_config(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<TrackerConfig>> {
    let tracker = guard_db(&state, &auth, state.trackers.get(&auth.user_id, &id).await).await?;
    Ok(Json(presets::resolve(Some(&tracker))))
}

// ─── Entries ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct EntryListParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

async fn list_entries(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Query(params): Query<EntryListParams>,
) -> Result<Json<Vec<Entry>>> {
    // Ownership check before querying entries.
    guard_db(&state, &auth, state.trackers.get(&auth.user_id, &id).await).await?;

    let entries = guard_db(
        &state,
        &auth,
        state
            .db
            .get_entries_for_tracker(&auth.user_id, &id, params.limit.min(200), params.offset)
            .await,
    )
    .await?;
    Ok(Json(entries))
}

#[derive(Deserialize, Validate)]
pub struct CreateEntryRequest {
    pub tracker_id: String,
    /// When the observation happened; defaults to now.
    #[serde(default)]
    pub timestamp: Option<String>,
    #[validate(range(min = 1, max = 10))]
    pub intensity: u8,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

async fn create_entry(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateEntryRequest>,
) -> Result<impl IntoResponse> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    // The tracker must exist and belong to the caller.
    guard_db(
        &state,
        &auth,
        state.trackers.get(&auth.user_id, &body.tracker_id).await,
    )
    .await?;

    let entry = Entry {
        id: Uuid::new_v4().to_string(),
        user_id: auth.user_id.clone(),
        tracker_id: body.tracker_id,
        timestamp: match body.timestamp {
            Some(raw) => normalize_rfc3339(&raw)
                .map_err(|e| AppError::BadRequest(format!("invalid timestamp: {}", e)))?,
            None => now_rfc3339(),
        },
        intensity: body.intensity,
        locations: body.locations,
        notes: body.notes,
        triggers: body.triggers,
        hashtags: body.hashtags,
    };

    guard_db(&state, &auth, state.db.upsert_entry(&entry).await).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[derive(Deserialize, Validate)]
pub struct UpdateEntryRequest {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[validate(range(min = 1, max = 10))]
    pub intensity: u8,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

async fn update_entry(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateEntryRequest>,
) -> Result<Json<Entry>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let existing = guard_db(&state, &auth, state.db.get_entry(&auth.user_id, &id).await)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("entry {}", id)))?;

    let mut entry = existing;
    if let Some(raw) = body.timestamp {
        entry.timestamp = normalize_rfc3339(&raw)
            .map_err(|e| AppError::BadRequest(format!("invalid timestamp: {}", e)))?;
    }
    entry.intensity = body.intensity;
    entry.locations = body.locations;
    entry.notes = body.notes;
    entry.triggers = body.triggers;
    entry.hashtags = body.hashtags;

    guard_db(&state, &auth, state.db.upsert_entry(&entry).await).await?;
    Ok(Json(entry))
}

async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let existing = guard_db(&state, &auth, state.db.get_entry(&auth.user_id, &id).await).await?;
    if existing.is_none() {
        return Err(AppError::NotFound(format!("entry {}", id)));
    }

    guard_db(&state, &auth, state.db.delete_entry(&id).await).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Stats ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct TrackerStats {
    pub tracker: Tracker,
    pub entry_count: usize,
}

/// Entry counts for every tracker, fanned out concurrently server-side.
async fn tracker_stats(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<TrackerStats>>> {
    let counted = guard_db(
        &state,
        &auth,
        state.trackers.entry_counts(&auth.user_id).await,
    )
    .await?;

    Ok(Json(
        counted
            .into_iter()
            .map(|(tracker, entry_count)| TrackerStats {
                tracker,
                entry_count,
            })
            .collect(),
    ))
}
