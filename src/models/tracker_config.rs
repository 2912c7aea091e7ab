// SPDX-License-Identifier: MIT

//! Tracker configuration types.
//!
//! [`GeneratedTrackerConfig`] is the AI-produced specification persisted on a
//! custom tracker; [`TrackerConfig`] is the fully resolved, ready-to-render
//! shape every entry surface consumes. Rendering code never branches on
//! tracker type — resolution happens once, in `services::presets`.

use serde::{Deserialize, Serialize};

/// Polarity tag selecting a canonical intensity palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityScaleKind {
    /// High values are concerning (pain, symptom severity): green → red
    HighBad,
    /// Low values are concerning (mood, sleep quality): red → green
    LowBad,
    /// Polarity is meaningless: fixed purple gradient
    Neutral,
}

/// One selectable location/context option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationOption {
    pub value: String,
    pub label: String,
}

/// AI-generated configuration specification for a custom tracker.
///
/// Dynamic provider output is never trusted as-is: [`Self::is_complete`] must
/// pass before this config is used, otherwise resolution falls back to the
/// generic default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedTrackerConfig {
    pub title: String,
    pub intensity_label: String,
    pub intensity_min_label: String,
    pub intensity_max_label: String,
    pub location_label: String,
    pub location_placeholder: String,
    pub triggers_label: String,
    pub notes_label: String,
    pub notes_placeholder: String,
    pub log_button_text: String,
    pub form_title: String,
    pub empty_state_text: String,
    pub delete_confirm_message: String,
    pub intensity_scale: IntensityScaleKind,
    pub location_options: Vec<LocationOption>,
    pub trigger_options: Vec<String>,
    #[serde(default)]
    pub suggested_hashtags: Vec<String>,
}

impl GeneratedTrackerConfig {
    /// Validity check: every required string field must be non-empty, and
    /// every location option must carry both a value and a label. A config
    /// failing this check must not be used.
    pub fn is_complete(&self) -> bool {
        let scalars = [
            &self.title,
            &self.intensity_label,
            &self.intensity_min_label,
            &self.intensity_max_label,
            &self.location_label,
            &self.location_placeholder,
            &self.triggers_label,
            &self.notes_label,
            &self.notes_placeholder,
            &self.log_button_text,
            &self.form_title,
            &self.empty_state_text,
            &self.delete_confirm_message,
        ];

        scalars.iter().all(|s| !s.trim().is_empty())
            && self
                .location_options
                .iter()
                .all(|o| !o.value.trim().is_empty() && !o.label.trim().is_empty())
    }
}

/// A 10-point intensity domain quantized into 5 bands, each with a label and
/// a color.
///
/// The bucketing is fixed and shared between labels and colors so the UI can
/// never show a label/color mismatch at a band boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityScale {
    labels: [String; 5],
    colors: [String; 5],
}

impl IntensityScale {
    /// Build a scale from an ordered 5-label set and a 5-color palette, both
    /// indexed low → high.
    pub fn new(labels: [&str; 5], colors: [&str; 5]) -> Self {
        Self {
            labels: labels.map(str::to_string),
            colors: colors.map(str::to_string),
        }
    }

    /// Quantize a 1..10 intensity into one of 5 bands.
    ///
    /// Values outside 1..10 are not validated here; request validation
    /// constrains intensity upstream. Out-of-range low clamps to the first
    /// band, high to the last.
    fn bucket(value: u8) -> usize {
        match value {
            0..=2 => 0,
            3..=4 => 1,
            5..=6 => 2,
            7..=8 => 3,
            _ => 4,
        }
    }

    pub fn label_of(&self, value: u8) -> &str {
        &self.labels[Self::bucket(value)]
    }

    pub fn color_of(&self, value: u8) -> &str {
        &self.colors[Self::bucket(value)]
    }
}

/// Fully resolved tracker configuration.
///
/// Every field is mandatory; resolution is total and never produces a
/// partially populated config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub title: String,
    pub intensity_label: String,
    pub intensity_min_label: String,
    pub intensity_max_label: String,
    pub location_label: String,
    pub location_placeholder: String,
    pub triggers_label: String,
    pub notes_label: String,
    pub notes_placeholder: String,
    pub log_button_text: String,
    pub form_title: String,
    pub empty_state_text: String,
    pub delete_confirm_message: String,
    pub scale: IntensityScale,
    pub location_options: Vec<LocationOption>,
    pub trigger_options: Vec<String>,
    pub suggested_hashtags: Vec<String>,
}

impl TrackerConfig {
    pub fn intensity_label_for(&self, value: u8) -> &str {
        self.scale.label_of(value)
    }

    pub fn intensity_color_for(&self, value: u8) -> &str {
        self.scale.color_of(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_scale() -> IntensityScale {
        IntensityScale::new(
            ["A", "B", "C", "D", "E"],
            ["#0", "#1", "#2", "#3", "#4"],
        )
    }

    #[test]
    fn test_bucket_boundaries() {
        let scale = test_scale();

        // Band switches happen exactly at 2/3, 4/5, 6/7, 8/9.
        assert_eq!(scale.label_of(1), "A");
        assert_eq!(scale.label_of(2), "A");
        assert_eq!(scale.label_of(3), "B");
        assert_eq!(scale.label_of(4), "B");
        assert_eq!(scale.label_of(5), "C");
        assert_eq!(scale.label_of(6), "C");
        assert_eq!(scale.label_of(7), "D");
        assert_eq!(scale.label_of(8), "D");
        assert_eq!(scale.label_of(9), "E");
        assert_eq!(scale.label_of(10), "E");
    }

    #[test]
    fn test_labels_and_colors_share_buckets() {
        let scale = test_scale();
        for v in 1..=10u8 {
            let label_idx = scale.labels.iter().position(|l| l == scale.label_of(v));
            let color_idx = scale.colors.iter().position(|c| c == scale.color_of(v));
            assert_eq!(label_idx, color_idx, "label/color mismatch at {}", v);
        }
    }

    fn complete_config() -> GeneratedTrackerConfig {
        GeneratedTrackerConfig {
            title: "Migraine".to_string(),
            intensity_label: "Pain level".to_string(),
            intensity_min_label: "Barely there".to_string(),
            intensity_max_label: "Worst imaginable".to_string(),
            location_label: "Where".to_string(),
            location_placeholder: "Select area".to_string(),
            triggers_label: "Triggers".to_string(),
            notes_label: "Notes".to_string(),
            notes_placeholder: "Anything else?".to_string(),
            log_button_text: "Log migraine".to_string(),
            form_title: "New migraine entry".to_string(),
            empty_state_text: "No migraines logged yet".to_string(),
            delete_confirm_message: "Delete this migraine entry?".to_string(),
            intensity_scale: IntensityScaleKind::HighBad,
            location_options: vec![LocationOption {
                value: "left_temple".to_string(),
                label: "Left temple".to_string(),
            }],
            trigger_options: vec!["stress".to_string()],
            suggested_hashtags: vec![],
        }
    }

    #[test]
    fn test_complete_config_passes_validity() {
        assert!(complete_config().is_complete());
    }

    #[test]
    fn test_empty_scalar_field_fails_validity() {
        let mut config = complete_config();
        config.empty_state_text = "   ".to_string();
        assert!(!config.is_complete());
    }

    #[test]
    fn test_blank_location_option_fails_validity() {
        let mut config = complete_config();
        config.location_options.push(LocationOption {
            value: "x".to_string(),
            label: "".to_string(),
        });
        assert!(!config.is_complete());
    }

    #[test]
    fn test_scale_kind_serde_tags() {
        assert_eq!(
            serde_json::to_string(&IntensityScaleKind::HighBad).unwrap(),
            "\"high_bad\""
        );
        let kind: IntensityScaleKind = serde_json::from_str("\"low_bad\"").unwrap();
        assert_eq!(kind, IntensityScaleKind::LowBad);
    }
}
