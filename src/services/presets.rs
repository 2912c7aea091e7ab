// SPDX-License-Identifier: MIT

//! Tracker config resolution.
//!
//! Deterministically derives a complete [`TrackerConfig`] from either a
//! static preset, an AI-generated specification, or the generic fallback.
//! Pure and total: no I/O, never panics, never returns a partial config.

use crate::models::tracker_config::{
    GeneratedTrackerConfig, IntensityScale, IntensityScaleKind, LocationOption, TrackerConfig,
};
use crate::models::{PresetKind, Tracker};

/// Severity-style palette: green → red.
const HIGH_BAD_COLORS: [&str; 5] = ["#22c55e", "#a3e635", "#facc15", "#f97316", "#ef4444"];

/// Wellness-style palette: red → green (low is concerning).
const LOW_BAD_COLORS: [&str; 5] = ["#ef4444", "#f97316", "#facc15", "#a3e635", "#22c55e"];

/// Fixed purple gradient for trackers where polarity is meaningless.
const NEUTRAL_COLORS: [&str; 5] = ["#ede9fe", "#c4b5fd", "#a78bfa", "#8b5cf6", "#6d28d9"];

/// Warm palette used by the effort preset.
const WARM_COLORS: [&str; 5] = ["#fef9c3", "#fde047", "#fbbf24", "#f59e0b", "#d97706"];

/// Canonical palette for a scale tag.
fn palette_for(kind: IntensityScaleKind) -> [&'static str; 5] {
    match kind {
        IntensityScaleKind::HighBad => HIGH_BAD_COLORS,
        IntensityScaleKind::LowBad => LOW_BAD_COLORS,
        IntensityScaleKind::Neutral => NEUTRAL_COLORS,
    }
}

/// Derive a complete config from the available sources.
///
/// Precedence, strictly in this order:
/// 1. A generated config that passes the validity check — the preset table is
///    never consulted when valid generated config exists.
/// 2. A known preset.
/// 3. The generic default.
pub fn derive_config(
    preset: Option<PresetKind>,
    generated: Option<&GeneratedTrackerConfig>,
) -> TrackerConfig {
    if let Some(generated) = generated {
        if generated.is_complete() {
            return from_generated(generated);
        }
        tracing::warn!(
            title = %generated.title,
            "Generated config is incomplete, falling back"
        );
    }

    match preset {
        Some(kind) => preset_config(kind),
        None => generic_config(),
    }
}

/// Resolve config for a tracker record; `None` (no tracker selected yet)
/// yields the generic default so callers never null-check.
pub fn resolve(tracker: Option<&Tracker>) -> TrackerConfig {
    match tracker {
        Some(t) => derive_config(t.preset_id, t.generated_config.as_ref()),
        None => generic_config(),
    }
}

/// Generic 5-band label set for a scale tag. Generated specs only carry
/// min/max endpoint labels, so the band labels follow the tag's polarity.
fn band_labels_for(kind: IntensityScaleKind) -> [&'static str; 5] {
    match kind {
        IntensityScaleKind::HighBad => ["Minimal", "Mild", "Moderate", "Severe", "Extreme"],
        IntensityScaleKind::LowBad => ["Very poor", "Poor", "Fair", "Good", "Excellent"],
        IntensityScaleKind::Neutral => ["Very low", "Low", "Moderate", "High", "Very high"],
    }
}

/// Bind a validated generated specification to its canonical palette.
fn from_generated(generated: &GeneratedTrackerConfig) -> TrackerConfig {
    let labels = band_labels_for(generated.intensity_scale);

    TrackerConfig {
        title: generated.title.clone(),
        intensity_label: generated.intensity_label.clone(),
        intensity_min_label: generated.intensity_min_label.clone(),
        intensity_max_label: generated.intensity_max_label.clone(),
        location_label: generated.location_label.clone(),
        location_placeholder: generated.location_placeholder.clone(),
        triggers_label: generated.triggers_label.clone(),
        notes_label: generated.notes_label.clone(),
        notes_placeholder: generated.notes_placeholder.clone(),
        log_button_text: generated.log_button_text.clone(),
        form_title: generated.form_title.clone(),
        empty_state_text: generated.empty_state_text.clone(),
        delete_confirm_message: generated.delete_confirm_message.clone(),
        scale: IntensityScale::new(labels, palette_for(generated.intensity_scale)),
        location_options: generated.location_options.clone(),
        trigger_options: generated.trigger_options.clone(),
        suggested_hashtags: generated.suggested_hashtags.clone(),
    }
}

fn options(pairs: &[(&str, &str)]) -> Vec<LocationOption> {
    pairs
        .iter()
        .map(|(value, label)| LocationOption {
            value: value.to_string(),
            label: label.to_string(),
        })
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Hand-authored config for a built-in preset. Each preset ships its own
/// literal labels, vocabularies and palette — nothing here is generated at
/// runtime.
pub fn preset_config(kind: PresetKind) -> TrackerConfig {
    match kind {
        PresetKind::Pain => TrackerConfig {
            title: "Pain".to_string(),
            intensity_label: "Pain level".to_string(),
            intensity_min_label: "None".to_string(),
            intensity_max_label: "Unbearable".to_string(),
            location_label: "Location".to_string(),
            location_placeholder: "Where does it hurt?".to_string(),
            triggers_label: "Possible triggers".to_string(),
            notes_label: "Notes".to_string(),
            notes_placeholder: "Describe the pain, what helped...".to_string(),
            log_button_text: "Log pain".to_string(),
            form_title: "How is your pain right now?".to_string(),
            empty_state_text: "No pain entries yet. Log your first one above.".to_string(),
            delete_confirm_message: "Delete this pain entry? This cannot be undone.".to_string(),
            scale: IntensityScale::new(
                ["None", "Mild", "Moderate", "Severe", "Unbearable"],
                HIGH_BAD_COLORS,
            ),
            location_options: options(&[
                ("head", "Head"),
                ("neck", "Neck"),
                ("shoulders", "Shoulders"),
                ("back", "Back"),
                ("abdomen", "Abdomen"),
                ("joints", "Joints"),
                ("other", "Other"),
            ]),
            trigger_options: strings(&[
                "stress",
                "poor sleep",
                "weather",
                "exercise",
                "food",
                "screen time",
            ]),
            suggested_hashtags: strings(&["#pain", "#flare"]),
        },
        PresetKind::Mood => TrackerConfig {
            title: "Mood".to_string(),
            intensity_label: "Mood".to_string(),
            intensity_min_label: "Very low".to_string(),
            intensity_max_label: "Great".to_string(),
            location_label: "Context".to_string(),
            location_placeholder: "Where were you?".to_string(),
            triggers_label: "What influenced it?".to_string(),
            notes_label: "Notes".to_string(),
            notes_placeholder: "What's on your mind?".to_string(),
            log_button_text: "Log mood".to_string(),
            form_title: "How are you feeling?".to_string(),
            empty_state_text: "No mood entries yet. Check in above.".to_string(),
            delete_confirm_message: "Delete this mood entry? This cannot be undone.".to_string(),
            scale: IntensityScale::new(
                ["Very low", "Low", "Okay", "Good", "Great"],
                LOW_BAD_COLORS,
            ),
            location_options: options(&[
                ("home", "Home"),
                ("work", "Work"),
                ("social", "With others"),
                ("outdoors", "Outdoors"),
                ("other", "Other"),
            ]),
            trigger_options: strings(&[
                "sleep",
                "work",
                "relationships",
                "health",
                "weather",
                "exercise",
            ]),
            suggested_hashtags: strings(&["#mood", "#checkin"]),
        },
        PresetKind::Sleep => TrackerConfig {
            title: "Sleep".to_string(),
            intensity_label: "Sleep quality".to_string(),
            intensity_min_label: "Terrible".to_string(),
            intensity_max_label: "Excellent".to_string(),
            location_label: "Where you slept".to_string(),
            location_placeholder: "Select a place".to_string(),
            triggers_label: "What affected it?".to_string(),
            notes_label: "Notes".to_string(),
            notes_placeholder: "Dreams, wake-ups, how you feel...".to_string(),
            log_button_text: "Log sleep".to_string(),
            form_title: "How did you sleep?".to_string(),
            empty_state_text: "No sleep entries yet. Log last night above.".to_string(),
            delete_confirm_message: "Delete this sleep entry? This cannot be undone.".to_string(),
            scale: IntensityScale::new(
                ["Terrible", "Poor", "Fair", "Good", "Excellent"],
                LOW_BAD_COLORS,
            ),
            location_options: options(&[
                ("own_bed", "Own bed"),
                ("travel", "Travelling"),
                ("couch", "Couch"),
                ("other", "Other"),
            ]),
            trigger_options: strings(&[
                "caffeine",
                "alcohol",
                "late screen time",
                "stress",
                "noise",
                "exercise",
            ]),
            suggested_hashtags: strings(&["#sleep"]),
        },
        // Effort carries its own literal warm palette instead of a canonical one.
        PresetKind::Effort => TrackerConfig {
            title: "Effort".to_string(),
            intensity_label: "Effort level".to_string(),
            intensity_min_label: "Effortless".to_string(),
            intensity_max_label: "Maximal".to_string(),
            location_label: "Activity".to_string(),
            location_placeholder: "What were you doing?".to_string(),
            triggers_label: "What made it harder?".to_string(),
            notes_label: "Notes".to_string(),
            notes_placeholder: "How did it go?".to_string(),
            log_button_text: "Log effort".to_string(),
            form_title: "How much effort did it take?".to_string(),
            empty_state_text: "No effort entries yet. Log one above.".to_string(),
            delete_confirm_message: "Delete this effort entry? This cannot be undone.".to_string(),
            scale: IntensityScale::new(
                ["Effortless", "Light", "Steady", "Hard", "Maximal"],
                WARM_COLORS,
            ),
            location_options: options(&[
                ("chores", "Chores"),
                ("work", "Work"),
                ("exercise", "Exercise"),
                ("social", "Social"),
                ("other", "Other"),
            ]),
            trigger_options: strings(&["fatigue", "pain", "low mood", "time pressure"]),
            suggested_hashtags: strings(&["#effort", "#spoons"]),
        },
    }
}

/// Generic default config: used for custom trackers without a usable
/// generated config, and whenever no tracker is selected.
pub fn generic_config() -> TrackerConfig {
    TrackerConfig {
        title: "Tracker".to_string(),
        intensity_label: "Intensity".to_string(),
        intensity_min_label: "Very low".to_string(),
        intensity_max_label: "Very high".to_string(),
        location_label: "Where".to_string(),
        location_placeholder: "Select an option".to_string(),
        triggers_label: "Contributing factors".to_string(),
        notes_label: "Notes".to_string(),
        notes_placeholder: "Anything worth remembering?".to_string(),
        log_button_text: "Log entry".to_string(),
        form_title: "New entry".to_string(),
        empty_state_text: "Nothing logged yet. Add your first entry above.".to_string(),
        delete_confirm_message: "Delete this entry? This cannot be undone.".to_string(),
        scale: IntensityScale::new(
            ["Very low", "Low", "Moderate", "High", "Very high"],
            NEUTRAL_COLORS,
        ),
        location_options: options(&[
            ("home", "Home"),
            ("work", "Work"),
            ("out", "Out and about"),
            ("other", "Other"),
        ]),
        trigger_options: strings(&["stress", "sleep", "diet", "activity", "other"]),
        suggested_hashtags: vec![],
    }
}
