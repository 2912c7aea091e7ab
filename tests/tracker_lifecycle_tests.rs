// SPDX-License-Identifier: MIT

//! Tracker lifecycle tests: default provisioning, deletion with replacement
//! selection, and config resolution against stored trackers.

mod common;

use common::{create_test_app, sample_generated_config};
use pulse_tracker::models::{Entry, PresetKind, TrackerType};
use pulse_tracker::services::generation::MockGeneration;
use pulse_tracker::services::presets;
use pulse_tracker::services::trackers::CustomCreate;

#[tokio::test]
async fn test_ensure_default_creates_pain_tracker_once() {
    let app = create_test_app();

    let first = app.state.trackers.ensure_default_tracker("u1").await.unwrap();
    assert_eq!(first.tracker_type, TrackerType::Preset);
    assert_eq!(first.preset_id, Some(PresetKind::Pain));
    assert!(first.is_default);

    let second = app.state.trackers.ensure_default_tracker("u1").await.unwrap();
    assert_eq!(second.id, first.id, "ensure-default must be idempotent");

    let all = app.state.trackers.list("u1").await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_concurrent_ensure_default_creates_one() {
    let app = create_test_app();
    let trackers = &app.state.trackers;

    let (a, b) = tokio::join!(
        trackers.ensure_default_tracker("u1"),
        trackers.ensure_default_tracker("u1"),
    );
    assert_eq!(a.unwrap().id, b.unwrap().id);
    assert_eq!(trackers.list("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_ensure_default_is_per_user() {
    let app = create_test_app();

    let a = app.state.trackers.ensure_default_tracker("u1").await.unwrap();
    let b = app.state.trackers.ensure_default_tracker("u2").await.unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(a.user_id, "u1");
    assert_eq!(b.user_id, "u2");
}

#[tokio::test]
async fn test_delete_cascades_entries_and_picks_default_replacement() {
    let app = create_test_app();

    let default = app.state.trackers.ensure_default_tracker("u1").await.unwrap();
    let custom = app
        .state
        .trackers
        .create_custom_generic("u1", "Knitting aches")
        .await
        .unwrap();

    for i in 0..3 {
        let entry = Entry {
            id: format!("e{}", i),
            user_id: "u1".to_string(),
            tracker_id: custom.id.clone(),
            timestamp: format!("2026-08-0{}T10:00:00Z", i + 1),
            intensity: 5,
            locations: vec![],
            notes: String::new(),
            triggers: vec![],
            hashtags: vec![],
        };
        app.state.db.upsert_entry(&entry).await.unwrap();
    }

    let outcome = app
        .state
        .trackers
        .delete_tracker("u1", &custom.id)
        .await
        .unwrap();

    assert_eq!(outcome.entries_deleted, 3);
    assert_eq!(
        outcome.replacement.as_ref().map(|t| t.id.as_str()),
        Some(default.id.as_str()),
        "replacement must prefer the default-flagged tracker"
    );
    assert_eq!(
        app.state.db.entry_count("u1", &custom.id).await.unwrap(),
        0,
        "entries must not outlive their tracker"
    );
}

#[tokio::test]
async fn test_delete_last_tracker_signals_onboarding() {
    let app = create_test_app();

    let only = app.state.trackers.ensure_default_tracker("u1").await.unwrap();
    let outcome = app
        .state
        .trackers
        .delete_tracker("u1", &only.id)
        .await
        .unwrap();

    assert!(outcome.replacement.is_none());
    assert!(app.state.trackers.list("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_rejects_foreign_tracker() {
    let app = create_test_app();

    let theirs = app.state.trackers.ensure_default_tracker("u2").await.unwrap();
    let result = app.state.trackers.delete_tracker("u1", &theirs.id).await;
    assert!(result.is_err(), "cross-user deletion must be rejected");

    // Untouched.
    assert_eq!(app.state.trackers.list("u2").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_custom_creation_stores_generated_config() {
    let app = create_test_app();

    let outcome = app
        .state
        .trackers
        .create_custom("u1", "Migraine", None)
        .await
        .unwrap();

    let tracker = match outcome {
        CustomCreate::Created(tracker) => tracker,
        CustomCreate::NeedsDescription => panic!("generator was scripted to succeed"),
    };
    assert_eq!(tracker.tracker_type, TrackerType::Custom);
    assert_eq!(tracker.generated_config, Some(sample_generated_config()));

    // Resolution binds the generated scale, not a preset table.
    let config = presets::resolve(Some(&tracker));
    assert_eq!(config.title, "Migraine");
    assert_eq!(config.intensity_label_for(10), "Extreme");
}

#[tokio::test]
async fn test_custom_creation_propagates_needs_description() {
    let app = create_test_app();
    app.generator.set(MockGeneration::NeedsDescription);

    let outcome = app
        .state
        .trackers
        .create_custom("u1", "Zorp", None)
        .await
        .unwrap();
    assert!(matches!(outcome, CustomCreate::NeedsDescription));
    assert!(
        app.state.trackers.list("u1").await.unwrap().is_empty(),
        "no tracker may be created before a description is supplied"
    );
}

#[tokio::test]
async fn test_generation_failure_leaves_no_tracker() {
    let app = create_test_app();
    app.generator
        .set(MockGeneration::Fail("provider exploded".to_string()));

    let result = app.state.trackers.create_custom("u1", "Migraine", None).await;
    assert!(result.is_err());
    assert!(app.state.trackers.list("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_generic_custom_tracker_resolves_generic_config() {
    let app = create_test_app();

    let tracker = app
        .state
        .trackers
        .create_custom_generic("u1", "Something else")
        .await
        .unwrap();
    assert!(tracker.generated_config.is_none());

    let config = presets::resolve(Some(&tracker));
    assert_eq!(config, presets::generic_config());
}
