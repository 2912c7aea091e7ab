// SPDX-License-Identifier: MIT

//! Webhook route for auth provider push events.
//!
//! The provider posts session lifecycle events here (sign-in, sign-out,
//! token refresh, password recovery). Events feed the session state machine
//! in arrival order. Responses are always 200 once the path UUID matches, so
//! the provider never retries an event we chose to ignore.

use crate::models::{Session, User};
use crate::services::session::AuthEvent;
use crate::AppState;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::post,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook/{uuid}", post(handle_event))
}

/// Provider event names.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    PasswordRecovery,
}

#[derive(Debug, Deserialize)]
struct ProviderSession {
    access_token: Option<String>,
    expires_at: Option<i64>,
    user: ProviderUser,
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderEvent {
    event: ProviderEventKind,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    session: Option<ProviderSession>,
}

fn to_session(raw: ProviderSession) -> Session {
    Session {
        user: User {
            id: raw.user.id,
            email: raw.user.email,
        },
        access_token: raw.access_token,
        expires_at: raw.expires_at,
    }
}

/// Handle a provider push event (POST).
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    Json(payload): Json<ProviderEvent>,
) -> StatusCode {
    if uuid != state.config.webhook_path_uuid {
        tracing::warn!(
            received_uuid = %uuid,
            "Security Alert: Webhook path UUID mismatch"
        );
        return StatusCode::NOT_FOUND;
    }

    let user_id = payload
        .user_id
        .clone()
        .or_else(|| payload.session.as_ref().map(|s| s.user.id.clone()));

    let Some(user_id) = user_id else {
        tracing::warn!(event = ?payload.event, "Provider event without a user, ignored");
        return StatusCode::OK;
    };

    tracing::info!(event = ?payload.event, user_id = %user_id, "Provider event");

    let event = match (payload.event, payload.session) {
        (ProviderEventKind::InitialSession, session) => {
            AuthEvent::InitialSession(session.map(to_session))
        }
        (ProviderEventKind::SignedIn, Some(session)) => AuthEvent::SignedIn(to_session(session)),
        (ProviderEventKind::SignedOut, _) => AuthEvent::SignedOut,
        (ProviderEventKind::TokenRefreshed, Some(session)) => {
            AuthEvent::TokenRefreshed(to_session(session))
        }
        (ProviderEventKind::PasswordRecovery, Some(session)) => {
            AuthEvent::PasswordRecovery(to_session(session))
        }
        (kind, None) => {
            tracing::warn!(event = ?kind, "Session-bearing event arrived without a session, ignored");
            return StatusCode::OK;
        }
    };

    state.sessions.apply_event(&user_id, event).await;
    StatusCode::OK
}
