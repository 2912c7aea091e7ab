// SPDX-License-Identifier: MIT

//! Email/password authentication routes.
//!
//! Every provider error is normalized before it reaches the client: raw
//! provider text maps through the friendly-message classifier, and sign-in
//! failures carry a best-effort account-existence hint for the UI only.

use crate::error::{friendly_auth_message, AppError, Result};
use crate::middleware::auth::{extract_token, SESSION_COOKIE};
use crate::models::User;
use crate::services::auth::classify_existence_hint;
use crate::services::session::{AuthEvent, SessionStateKind};
use crate::AppState;
use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signout", post(sign_out))
        .route("/auth/session", get(session))
        .route("/auth/probe", post(probe))
        .route("/auth/recover", post(recover))
        .route("/auth/password", put(update_password))
}

#[derive(Deserialize, Validate)]
pub struct CredentialsRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Serialize)]
pub struct SignInResponse {
    pub user: User,
}

#[derive(Serialize)]
pub struct SignUpResponse {
    pub user: Option<User>,
    /// True when a confirmation email was sent and no session exists yet.
    pub pending_confirmation: bool,
    pub message: &'static str,
}

/// Error body for rejected credentials.
#[derive(Serialize)]
struct AuthRejection {
    error: &'static str,
    message: &'static str,
    /// Best-effort hint whether an account exists for this email. UX only;
    /// absent when the provider wording was inconclusive.
    #[serde(skip_serializing_if = "Option::is_none")]
    account_exists: Option<bool>,
}

fn session_cookie(token: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<CredentialsRequest>,
) -> Result<impl IntoResponse> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    match state.auth.sign_up(&body.email, &body.password).await {
        Ok(Some(session)) => {
            let user = session.user.clone();
            state
                .sessions
                .apply_event(&user.id, AuthEvent::SignedIn(session.clone()))
                .await;

            let jar = match &session.access_token {
                Some(token) => jar.add(session_cookie(token)),
                None => jar,
            };
            Ok((
                StatusCode::CREATED,
                jar,
                Json(SignUpResponse {
                    user: Some(user),
                    pending_confirmation: false,
                    message: "Account created.",
                }),
            )
                .into_response())
        }
        Ok(None) => Ok((
            StatusCode::CREATED,
            Json(SignUpResponse {
                user: None,
                pending_confirmation: true,
                message: "Check your email to confirm your account.",
            }),
        )
            .into_response()),
        Err(AppError::InvalidSession(raw)) => Ok((
            StatusCode::BAD_REQUEST,
            Json(AuthRejection {
                error: "signup_rejected",
                message: friendly_auth_message(&raw),
                account_exists: classify_existence_hint(&raw),
            }),
        )
            .into_response()),
        Err(e) => Err(e),
    }
}

async fn sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<CredentialsRequest>,
) -> Result<impl IntoResponse> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    match state.auth.sign_in(&body.email, &body.password).await {
        Ok(session) => {
            let user = session.user.clone();
            state
                .sessions
                .apply_event(&user.id, AuthEvent::SignedIn(session.clone()))
                .await;

            let jar = match &session.access_token {
                Some(token) => jar.add(session_cookie(token)),
                None => jar,
            };
            Ok((jar, Json(SignInResponse { user })).into_response())
        }
        Err(AppError::InvalidSession(raw)) => Ok((
            StatusCode::UNAUTHORIZED,
            Json(AuthRejection {
                error: "invalid_credentials",
                message: friendly_auth_message(&raw),
                account_exists: classify_existence_hint(&raw),
            }),
        )
            .into_response()),
        Err(e) => Err(e),
    }
}

async fn sign_out(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
) -> Result<impl IntoResponse> {
    if let Some(token) = extract_token(&jar, &request) {
        if let Ok(claims) = state.sessions.decode_claims(&token) {
            state
                .sessions
                .apply_event(&claims.sub, AuthEvent::SignedOut)
                .await;
        }
        // Best-effort: the local session is gone either way.
        if let Err(e) = state.auth.sign_out(&token).await {
            tracing::warn!(error = %e, "Provider sign-out failed");
        }
    }

    Ok((jar.remove(clear_session_cookie()), StatusCode::NO_CONTENT))
}

#[derive(Deserialize)]
pub struct SessionParams {
    /// Set when the user arrived through an email-confirmation link.
    #[serde(default)]
    confirmed: bool,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub user: Option<User>,
    pub state: SessionStateKind,
    pub auth_loading: bool,
    /// One-shot: true exactly once after an email confirmation arrival.
    pub email_just_confirmed: bool,
}

/// Current session snapshot for the app shell.
async fn session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<SessionParams>,
    request: Request,
) -> Result<Json<SessionResponse>> {
    let Some(token) = extract_token(&jar, &request) else {
        return Ok(Json(SessionResponse {
            user: None,
            state: SessionStateKind::Unauthenticated,
            auth_loading: false,
            email_just_confirmed: false,
        }));
    };

    let Ok(claims) = state.sessions.decode_claims(&token) else {
        return Ok(Json(SessionResponse {
            user: None,
            state: SessionStateKind::Unauthenticated,
            auth_loading: false,
            email_just_confirmed: false,
        }));
    };

    if params.confirmed {
        state.sessions.note_email_confirmed(&claims.sub);
    }

    let user = state.sessions.authorize(&token).await.ok();
    let snapshot = state.sessions.snapshot(&claims.sub);
    let email_just_confirmed =
        user.is_some() && state.sessions.take_email_confirmed(&claims.sub);

    Ok(Json(SessionResponse {
        user: user.or(snapshot.user),
        state: snapshot.state,
        auth_loading: snapshot.auth_loading,
        email_just_confirmed,
    }))
}

#[derive(Deserialize, Validate)]
pub struct ProbeRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Serialize)]
pub struct ProbeResponse {
    /// Best-effort hint; `null` when the provider wording was inconclusive.
    pub account_exists: Option<bool>,
}

/// Best-effort account-existence probe: attempt a sign-in with a throwaway
/// password and classify the provider's rejection text. UX hinting only.
async fn probe(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProbeRequest>,
) -> Result<Json<ProbeResponse>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let throwaway = format!("probe-{}", uuid::Uuid::new_v4());
    let account_exists = match state.auth.sign_in(&body.email, &throwaway).await {
        Ok(session) => {
            // A random password matched; discard the session immediately.
            if let Some(token) = &session.access_token {
                let _ = state.auth.sign_out(token).await;
            }
            Some(true)
        }
        Err(AppError::InvalidSession(raw)) => classify_existence_hint(&raw),
        Err(_) => None,
    };

    Ok(Json(ProbeResponse { account_exists }))
}

#[derive(Deserialize, Validate)]
pub struct RecoverRequest {
    #[validate(email)]
    pub email: String,
}

/// Always answers the same way so the endpoint can't be used to enumerate
/// accounts.
async fn recover(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RecoverRequest>,
) -> Result<impl IntoResponse> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if let Err(e) = state.auth.send_recovery(&body.email).await {
        tracing::warn!(error = %e, "Recovery email send failed");
    }

    Ok(Json(serde_json::json!({
        "message": "If an account exists for that address, a recovery email is on its way."
    })))
}

#[derive(Deserialize, Validate)]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 8))]
    pub new_password: String,
}

async fn update_password(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
) -> Result<impl IntoResponse> {
    let token = extract_token(&jar, &request).ok_or(AppError::Unauthorized)?;
    let claims = state
        .sessions
        .decode_claims(&token)
        .map_err(|_| AppError::Unauthorized)?;

    let body = axum::body::to_bytes(request.into_body(), 64 * 1024)
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let body: UpdatePasswordRequest =
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?;
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state.auth.update_password(&token, &body.new_password).await?;
    state
        .sessions
        .apply_event(&claims.sub, AuthEvent::PasswordUpdated)
        .await;

    Ok(Json(serde_json::json!({ "message": "Password updated." })))
}
