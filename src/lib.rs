// SPDX-License-Identifier: MIT

//! Pulse Tracker: personal health tracking backend
//!
//! This crate provides the backend API for tracker configuration resolution,
//! entry logging, and auth session lifecycle management.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::auth::AuthProvider;
use services::session::SessionService;
use services::trackers::TrackerService;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub auth: Arc<dyn AuthProvider>,
    pub sessions: Arc<SessionService>,
    pub trackers: TrackerService,
}
