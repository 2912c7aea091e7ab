// SPDX-License-Identifier: MIT

//! End-to-end flow: signup with confirmation, sign-in, default tracker
//! provisioning, and config resolution over the HTTP surface.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::create_test_app;
use serde_json::{json, Value};
use tower::ServiceExt; // for oneshot

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed(mut request: Request<Body>, token: &str) -> Request<Body> {
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", token).parse().unwrap(),
    );
    request
}

#[tokio::test]
async fn test_signup_confirm_signin_and_default_tracker() {
    let app = create_test_app();
    app.provider.set_require_confirmation(true);

    // 1. Signup: confirmation required, no session yet.
    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/auth/signup",
            json!({ "email": "pat@example.com", "password": "hunter2hunter2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["pending_confirmation"], json!(true));
    assert!(body["user"].is_null());

    // 2. Sign-in before confirming fails with a friendly message.
    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/auth/signin",
            json!({ "email": "pat@example.com", "password": "hunter2hunter2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(
        body["message"],
        json!("Please confirm your email address before signing in.")
    );
    // The account does exist; the hint says so.
    assert_eq!(body["account_exists"], json!(true));

    // 3. Confirm and sign in.
    app.provider.confirm_email("pat@example.com");
    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/auth/signin",
            json!({ "email": "pat@example.com", "password": "hunter2hunter2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("sign-in must set the session cookie")
        .to_str()
        .unwrap()
        .to_string();
    let token = cookie
        .split(';')
        .next()
        .unwrap()
        .trim_start_matches("pulse_token=")
        .to_string();
    let body = body_json(response).await;
    let user_id = body["user"]["id"].as_str().unwrap().to_string();
    assert!(!user_id.is_empty());

    // 4. Session snapshot with the confirmation marker acknowledges once.
    let response = app
        .router
        .clone()
        .oneshot(authed(
            Request::builder()
                .uri("/auth/session?confirmed=true")
                .body(Body::empty())
                .unwrap(),
            &token,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["state"], json!("authenticated"));
    assert_eq!(body["email_just_confirmed"], json!(true));

    let response = app
        .router
        .clone()
        .oneshot(authed(
            Request::builder()
                .uri("/auth/session")
                .body(Body::empty())
                .unwrap(),
            &token,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(
        body["email_just_confirmed"],
        json!(false),
        "the confirmation acknowledgment is one-shot"
    );

    // 5. First protected call provisions the default tracker.
    let response = app
        .router
        .clone()
        .oneshot(authed(
            post_json("/api/trackers/ensure-default", json!({})),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tracker = body_json(response).await;
    assert_eq!(tracker["preset_id"], json!("pain"));
    assert_eq!(tracker["is_default"], json!(true));
    let tracker_id = tracker["id"].as_str().unwrap().to_string();

    // 6. Resolved config comes from the pain preset's static table.
    let response = app
        .router
        .clone()
        .oneshot(authed(
            Request::builder()
                .uri(format!("/api/trackers/{}/config", tracker_id))
                .body(Body::empty())
                .unwrap(),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let config = body_json(response).await;
    assert_eq!(config["intensity_label"], json!("Pain level"));
    // Band 5 of the high-bad palette.
    assert_eq!(config["scale"]["labels"][4], json!("Unbearable"));
    assert_eq!(config["scale"]["colors"][4], json!("#ef4444"));
}

#[tokio::test]
async fn test_sign_in_rejects_malformed_credentials() {
    let app = create_test_app();

    // Never reaches the provider; request validation trips first.
    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/auth/signin",
            json!({ "email": "not-an-email", "password": "hunter2hunter2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/auth/signin",
            json!({ "email": "pat@example.com", "password": "short" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_probe_hints_without_confirming_unknowns() {
    let app = create_test_app();
    app.provider.set_require_confirmation(true);

    app.router
        .clone()
        .oneshot(post_json(
            "/auth/signup",
            json!({ "email": "pat@example.com", "password": "hunter2hunter2" }),
        ))
        .await
        .unwrap();

    // Unconfirmed account: the provider wording gives the hint away.
    let response = app
        .router
        .clone()
        .oneshot(post_json("/auth/probe", json!({ "email": "pat@example.com" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["account_exists"], json!(true));

    // Unknown address: same wording as a wrong password, so inconclusive.
    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/auth/probe",
            json!({ "email": "nobody@example.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["account_exists"].is_null());
}

#[tokio::test]
async fn test_sign_out_clears_cookie_and_session() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/auth/signup",
            json!({ "email": "pat@example.com", "password": "hunter2hunter2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let token = cookie
        .split(';')
        .next()
        .unwrap()
        .trim_start_matches("pulse_token=")
        .to_string();

    let response = app
        .router
        .clone()
        .oneshot(authed(post_json("/auth/signout", json!({})), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The credential is dead server-side; protected calls now fail.
    let response = app
        .router
        .clone()
        .oneshot(authed(
            Request::builder()
                .uri("/api/trackers")
                .body(Body::empty())
                .unwrap(),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_custom_tracker_generation_flow_over_http() {
    let app = create_test_app();
    let (_, token) = common::authenticated_user(&app, "u1", "u1@example.com");

    let response = app
        .router
        .clone()
        .oneshot(authed(
            post_json("/api/trackers", json!({ "name": "Migraine" })),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["needs_description"], json!(false));
    assert_eq!(body["tracker"]["type"], json!("custom"));
    assert_eq!(body["tracker"]["generated_config"]["title"], json!("Migraine"));

    // Unrecognized name without a description: distinct branch, not an error.
    app.generator
        .set(pulse_tracker::services::generation::MockGeneration::NeedsDescription);
    let response = app
        .router
        .clone()
        .oneshot(authed(
            post_json("/api/trackers", json!({ "name": "Zorp" })),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["needs_description"], json!(true));
    assert!(body["tracker"].is_null());
}
