// SPDX-License-Identifier: MIT

use pulse_tracker::config::Config;
use pulse_tracker::db::FirestoreDb;
use pulse_tracker::models::{GeneratedTrackerConfig, IntensityScaleKind, LocationOption, User};
use pulse_tracker::routes::create_router;
use pulse_tracker::services::auth::MockAuthProvider;
use pulse_tracker::services::generation::{ConfigGenerator, MockGeneration, MockGenerator};
use pulse_tracker::services::images::ImageClient;
use pulse_tracker::services::session::SessionService;
use pulse_tracker::services::trackers::TrackerService;
use pulse_tracker::AppState;
use std::sync::Arc;

/// Create a mock database connection (offline, in-memory).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// A complete generated config for scripting the mock generator.
#[allow(dead_code)]
pub fn sample_generated_config() -> GeneratedTrackerConfig {
    GeneratedTrackerConfig {
        title: "Migraine".to_string(),
        intensity_label: "Pain level".to_string(),
        intensity_min_label: "Barely there".to_string(),
        intensity_max_label: "Worst imaginable".to_string(),
        location_label: "Where does it hurt?".to_string(),
        location_placeholder: "Select area".to_string(),
        triggers_label: "Possible triggers".to_string(),
        notes_label: "Notes".to_string(),
        notes_placeholder: "Anything else worth noting?".to_string(),
        log_button_text: "Log migraine".to_string(),
        form_title: "New migraine entry".to_string(),
        empty_state_text: "No migraines logged yet".to_string(),
        delete_confirm_message: "Delete this migraine entry?".to_string(),
        intensity_scale: IntensityScaleKind::HighBad,
        location_options: vec![LocationOption {
            value: "left_temple".to_string(),
            label: "Left temple".to_string(),
        }],
        trigger_options: vec!["stress".to_string(), "bright light".to_string()],
        suggested_hashtags: vec!["#migraine".to_string()],
    }
}

/// Everything a test needs to drive the app offline.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub provider: Arc<MockAuthProvider>,
    pub generator: Arc<MockGenerator>,
}

/// Create a test app with offline mock dependencies.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::test_default())
}

/// Create a test app with a customized config (e.g. a different trust policy).
#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> TestApp {
    let db = test_db_offline();
    let provider = Arc::new(MockAuthProvider::with_secret(&config.auth_jwt_secret));
    let sessions = Arc::new(SessionService::new(provider.clone(), &config));

    let generator = Arc::new(MockGenerator::new(MockGeneration::Config(
        sample_generated_config(),
    )));
    let images = Arc::new(ImageClient::disabled());

    let trackers = TrackerService::new(
        db.clone(),
        generator.clone() as Arc<dyn ConfigGenerator>,
        images,
    );

    let state = Arc::new(AppState {
        config,
        db,
        auth: provider.clone(),
        sessions,
        trackers,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        provider,
        generator,
    }
}

/// Mint an access token the way the provider would, and register its session
/// so the authoritative check accepts it.
#[allow(dead_code)]
pub fn authenticated_user(app: &TestApp, user_id: &str, email: &str) -> (User, String) {
    let user = User {
        id: user_id.to_string(),
        email: Some(email.to_string()),
    };
    let token = mint_jwt(&app.state.config.auth_jwt_secret, user_id, email);
    app.provider.insert_session(&token, user.clone());
    (user, token)
}

/// Create an HS256 access token with the standard claims.
#[allow(dead_code)]
pub fn mint_jwt(secret: &[u8], user_id: &str, email: &str) -> String {
    let claims = serde_json::json!({
        "sub": user_id,
        "email": email,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret),
    )
    .expect("Failed to create JWT")
}
