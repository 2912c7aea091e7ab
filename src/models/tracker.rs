// SPDX-License-Identifier: MIT

//! Tracker model.

use crate::models::tracker_config::GeneratedTrackerConfig;
use serde::{Deserialize, Serialize};

/// Whether a tracker derives its config from a built-in preset or from a
/// (possibly missing) generated specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerType {
    Preset,
    Custom,
}

/// Built-in tracker archetypes with hand-authored static configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetKind {
    Pain,
    Mood,
    Sleep,
    Effort,
}

impl PresetKind {
    /// Display name used when creating a tracker from this preset.
    pub fn display_name(&self) -> &'static str {
        match self {
            PresetKind::Pain => "Pain",
            PresetKind::Mood => "Mood",
            PresetKind::Sleep => "Sleep",
            PresetKind::Effort => "Effort",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            PresetKind::Pain => "activity",
            PresetKind::Mood => "smile",
            PresetKind::Sleep => "moon",
            PresetKind::Effort => "flame",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            PresetKind::Pain => "#ef4444",
            PresetKind::Mood => "#f59e0b",
            PresetKind::Sleep => "#6366f1",
            PresetKind::Effort => "#d97706",
        }
    }
}

/// A named category of observation a user logs entries against.
///
/// `type` and `preset_id`/`generated_config` are mutually informative: preset
/// trackers resolve config from the static preset table, custom trackers from
/// `generated_config` when present and valid, else the generic fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tracker {
    /// Tracker ID (also used as document ID)
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub tracker_type: TrackerType,
    pub preset_id: Option<PresetKind>,
    pub icon: String,
    pub color: String,
    /// At most one tracker per user should carry this flag; enforced by the
    /// lifecycle coordinator rather than a store constraint, so concurrent
    /// creation races are tolerated downstream.
    pub is_default: bool,
    pub generated_config: Option<GeneratedTrackerConfig>,
    pub image_url: Option<String>,
    /// When the tracker was created (ISO 8601)
    pub created_at: String,
    /// Last modification timestamp (ISO 8601)
    pub updated_at: String,
}
