//! Operator scenarios driven through `ControlSurface`
//!
//! Every operation answers with a `ControlOutcome`/`ControlReply`; these
//! tests check both the reported outcome and its effect on seam outputs.

use std::sync::Arc;

use seam_tracker::api::{ControlErrorCodes, RegistryErrorCodes};
use seam_tracker::config::AppConfig;
use seam_tracker::telemetry::MetricEvent;
use seam_tracker::{ControlSurface, ProfileSample, TrackerHandle};

fn surface_with(definitions: &str) -> (ControlSurface, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = AppConfig::default();
    config.segmentation.min_run_len = 3;
    config.storage.definitions_path = dir.path().join("transforms.json");
    std::fs::write(&config.storage.definitions_path, definitions).expect("definitions");
    (
        ControlSurface::new(Arc::new(TrackerHandle::from_config(config))),
        dir,
    )
}

fn two_plates() -> ProfileSample {
    ProfileSample::new(vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0], vec![0.0; 6])
}

fn confirmed(surface: &ControlSurface) -> (f64, f64) {
    let mut last = None;
    for _ in 0..3 {
        last = Some(
            surface
                .handle()
                .process_sample(&two_plates())
                .expect("processed"),
        );
    }
    let out = last.expect("three outputs");
    assert!(out.valid);
    (out.x, out.y)
}

#[test]
fn test_edit_then_select_applies_new_body() {
    let (surface, _dir) = surface_with(r#"[{"id": 0, "body": "segment\npick 0"}]"#);
    assert_eq!(confirmed(&surface), (0.0, 0.0));

    let outcome = surface.set_definition(Some(0), "segment\npick 3");
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(confirmed(&surface), (0.0, 0.0));

    let outcome = surface.set_task(0);
    assert!(outcome.success);
    assert_eq!(outcome.message, "Task 0 selected");
    assert_eq!(confirmed(&surface), (12.0, 0.0));
}

#[test]
fn test_broken_edit_keeps_running_program() {
    let (surface, _dir) = surface_with(r#"[{"id": 0, "body": "segment\npick 1"}]"#);

    assert!(surface.set_definition(None, "segment\npick one").success);
    let view = surface
        .get_definition(None)
        .into_value()
        .expect("definition under cursor");
    assert!(!view.valid);

    let outcome = surface.set_task(0);
    assert!(!outcome.success);
    assert_eq!(outcome.code, RegistryErrorCodes::SELECTION);
    assert_eq!(confirmed(&surface), (2.0, 0.0));
}

#[test]
fn test_offsets_shift_output_and_reject_garbage() {
    let (surface, _dir) = surface_with(r#"[{"id": 0, "body": "segment\npick 2"}]"#);

    assert!(surface.set_offsets(Some(5.0), Some(-2.0)).success);
    assert_eq!(confirmed(&surface), (15.0, -2.0));

    for raw in ["", "abc", "NaN", "inf"] {
        let outcome = surface.set_offset_x(raw);
        assert!(!outcome.success, "{raw:?} accepted");
        assert_eq!(outcome.code, ControlErrorCodes::INVALID_OFFSET);
    }
    assert!(surface.set_offset_y(" 0.5 ").success);
    let offsets = surface.get_offsets().into_value().expect("offsets");
    assert_eq!((offsets.x, offsets.y), (5.0, 0.5));
}

#[test]
fn test_replace_all_then_persist() {
    let (surface, dir) = surface_with("[]");
    assert_eq!(surface.get_task().into_value(), None);

    let outcome = surface.set_definitions(
        r#"[{"id": 10, "body": "lowest"}, {"id": 20, "body": "highest"}]"#,
    );
    assert_eq!(outcome.message, "2 definitions set");
    assert!(surface.set_task(20).success);
    assert!(surface.dump().success);

    let stored = std::fs::read_to_string(dir.path().join("transforms.json")).expect("stored");
    assert!(stored.contains("\"highest\""));

    let snapshot = surface.telemetry_snapshot();
    assert!(snapshot
        .recent
        .iter()
        .any(|event| matches!(event, MetricEvent::TaskSelected { id: 20 })));
    assert!(snapshot
        .recent
        .iter()
        .any(|event| matches!(event, MetricEvent::DefinitionsDumped { count: 2 })));
}

#[test]
fn test_load_failure_keeps_registry() {
    let (surface, dir) = surface_with(r#"[{"id": 0, "body": "none"}]"#);
    std::fs::write(dir.path().join("transforms.json"), "{ not json").expect("corrupt store");

    let outcome = surface.load();
    assert!(!outcome.success);
    assert_eq!(outcome.code, RegistryErrorCodes::LOAD);
    assert_eq!(surface.count().into_value(), Some(1));
}
