// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod entry;
pub mod tracker;
pub mod tracker_config;
pub mod user;

pub use entry::Entry;
pub use tracker::{PresetKind, Tracker, TrackerType};
pub use tracker_config::{
    GeneratedTrackerConfig, IntensityScale, IntensityScaleKind, LocationOption, TrackerConfig,
};
pub use user::{Session, User};
