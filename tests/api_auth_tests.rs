// SPDX-License-Identifier: MIT

//! Authorization tests for the protected API surface and the webhook path.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{authenticated_user, create_test_app, mint_jwt};
use pulse_tracker::services::auth::MockFetchMode;
use serde_json::json;
use tower::ServiceExt; // for oneshot

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn bearer(mut request: Request<Body>, token: &str) -> Request<Body> {
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", token).parse().unwrap(),
    );
    request
}

#[tokio::test]
async fn test_health_is_public() {
    let app = create_test_app();
    let response = app.router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_a_token() {
    let app = create_test_app();

    for uri in ["/api/trackers", "/api/stats/trackers"] {
        let response = app.router.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let app = create_test_app();
    let response = app
        .router
        .oneshot(bearer(get("/api/trackers"), "not-a-jwt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_well_formed_token_without_live_session_is_rejected() {
    let app = create_test_app();
    // Signed with the right secret, but the provider has no session for it.
    let token = mint_jwt(&app.state.config.auth_jwt_secret, "ghost", "g@example.com");

    let response = app
        .router
        .oneshot(bearer(get("/api/trackers"), &token))
        .await
        .unwrap();
    assert_eq!(
        response.status(),
        StatusCode::UNAUTHORIZED,
        "authoritative policy must not trust a locally valid token alone"
    );
}

#[tokio::test]
async fn test_cache_first_trusts_local_decode() {
    let mut config = pulse_tracker::config::Config::test_default();
    config.trust_policy = pulse_tracker::config::TrustPolicy::CacheFirst;
    let app = common::create_test_app_with_config(config);

    // Provider unreachable; cache-first still serves from the decoded token.
    app.provider.set_fetch_mode(MockFetchMode::Transient);
    let token = mint_jwt(&app.state.config.auth_jwt_secret, "u1", "u1@example.com");

    let response = app
        .router
        .oneshot(bearer(get("/api/trackers"), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_valid_session_passes() {
    let app = create_test_app();
    let (_, token) = authenticated_user(&app, "u1", "u1@example.com");

    let response = app
        .router
        .oneshot(bearer(get("/api/trackers"), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_rejects_wrong_path_uuid() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/wrong-uuid")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "event": "SIGNED_OUT", "user_id": "u1" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_feeds_the_state_machine() {
    let app = create_test_app();
    let (_, token) = authenticated_user(&app, "u1", "u1@example.com");
    app.state.sessions.validate(&token).await;

    let uri = format!("/webhook/{}", app.state.config.webhook_path_uuid);
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "event": "SIGNED_OUT", "user_id": "u1" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        app.state.sessions.snapshot("u1").state,
        pulse_tracker::services::session::SessionStateKind::Unauthenticated
    );
    assert!(app.state.sessions.peek("u1").is_none());
}

#[tokio::test]
async fn test_webhook_ignores_malformed_events_quietly() {
    let app = create_test_app();

    let uri = format!("/webhook/{}", app.state.config.webhook_path_uuid);
    // Session-bearing event without a session: acknowledged, not applied.
    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "event": "TOKEN_REFRESHED", "user_id": "u1" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
