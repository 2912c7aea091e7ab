// SPDX-License-Identifier: MIT

//! Pulse Tracker API Server
//!
//! Personal health tracking: preset and AI-configured trackers, logged
//! entries, and a session lifecycle that never trusts a stale credential.

use pulse_tracker::{
    config::Config,
    db::FirestoreDb,
    services::auth::AuthApiClient,
    services::generation::GenerationClient,
    services::images::ImageClient,
    services::session::SessionService,
    services::trackers::TrackerService,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, policy = ?config.trust_policy, "Starting Pulse Tracker API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Auth provider client and session service
    let auth = Arc::new(AuthApiClient::new(&config.auth_base_url, &config.auth_api_key));
    let sessions = Arc::new(SessionService::new(auth.clone(), &config));
    tracing::info!("Session service initialized");

    // Generation clients
    let generator = Arc::new(GenerationClient::new(&config));
    let images = Arc::new(ImageClient::new(&config));

    let trackers = TrackerService::new(db.clone(), generator, images);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        auth,
        sessions,
        trackers,
    });

    // Periodic sweep of per-user session and lock bookkeeping.
    let sweeper = state.clone();
    let sweep_interval =
        std::time::Duration::from_secs(config.session_cache_ttl_secs.max(60));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            sweeper.sessions.evict_expired();
            sweeper.trackers.evict_idle_locks();
        }
    });

    // Build router
    let app = pulse_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pulse_tracker=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
