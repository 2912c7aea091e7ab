// SPDX-License-Identifier: MIT

//! Session authentication middleware.
//!
//! Extracts the provider access token (cookie first, then bearer header) and
//! gates the request through [`SessionService::authorize`], so protected
//! routes honor the configured trust policy rather than trusting a locally
//! decoded token unconditionally.

use crate::config::TrustPolicy;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "pulse_token";

/// Authenticated user attached to the request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
    /// The raw access token, kept so downstream fail-closed paths can purge
    /// the exact credential.
    pub access_token: String,
}

/// Pull the access token out of the request, cookie first then header.
pub fn extract_token(jar: &CookieJar, request: &Request) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;

    auth_header.strip_prefix("Bearer ").map(str::to_string)
}

/// Middleware that requires a validated session.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_token(&jar, &request).ok_or(StatusCode::UNAUTHORIZED)?;

    let user = state
        .sessions
        .authorize(&token)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    // Under cache-first an unverified token is served optimistically;
    // revalidate in the background so revocation still catches up.
    if state.sessions.policy() == TrustPolicy::CacheFirst
        && state.sessions.peek(&user.id).is_none()
    {
        let sessions = state.sessions.clone();
        let background_token = token.clone();
        tokio::spawn(async move {
            sessions.validate(&background_token).await;
        });
    }

    let auth_user = AuthUser {
        user_id: user.id,
        email: user.email,
        access_token: token,
    };
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}
