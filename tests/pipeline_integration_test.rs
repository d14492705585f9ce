//! End-to-end pipeline tests through `TrackerHandle`
//!
//! Samples enter either synchronously (`process_sample`) or through the
//! ingress queue; outputs are collected from the seam broadcast channel.

use std::path::{Path, PathBuf};

use seam_tracker::config::AppConfig;
use seam_tracker::{PointKind, ProfileSample, SeamOutput, TrackerHandle};
use tokio::sync::broadcast::error::TryRecvError;

fn fixture_profiles() -> Vec<ProfileSample> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("two_plates.jsonl");
    std::fs::read_to_string(path)
        .expect("fixture profiles")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("profile sample"))
        .collect()
}

fn tracker_in(dir: &Path, definitions: &str) -> TrackerHandle {
    let mut config = AppConfig::default();
    config.segmentation.min_run_len = 5;
    config.storage.definitions_path = dir.join("transforms.json");
    std::fs::write(&config.storage.definitions_path, definitions).expect("definitions");
    TrackerHandle::from_config(config)
}

const DEFINITIONS: &str = r#"[
    {"id": 0, "body": "segment\npick 1"},
    {"id": 1, "body": "segment\npick 2"}
]"#;

fn drain(rx: &mut tokio::sync::broadcast::Receiver<SeamOutput>) -> Vec<SeamOutput> {
    let mut outputs = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(output) => outputs.push(output),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    outputs
}

#[test]
fn test_fixture_replay_confirms_gap_start() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tracker = tracker_in(dir.path(), DEFINITIONS);
    let samples = fixture_profiles();

    let outputs: Vec<SeamOutput> = samples
        .iter()
        .map(|sample| tracker.process_sample(sample).expect("processed"))
        .collect();

    // one empty sample among nine; the first two real ones fill the window
    assert_eq!(outputs.len(), 9);
    assert_eq!(outputs.iter().filter(|out| out.valid).count(), 6);

    let first = outputs.iter().find(|out| out.valid).expect("valid output");
    assert!((first.x - 4.1).abs() < 1e-9);
    assert!((first.y + 0.5).abs() < 1e-9);
    assert_eq!(first.count(PointKind::Seam), 1);
    assert_eq!(first.count(PointKind::Profile), 18);

    let empty = &outputs[4];
    assert!(!empty.valid);
    assert!(empty.points.is_empty());
}

#[test]
fn test_ingress_queue_matches_synchronous_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tracker = tracker_in(dir.path(), DEFINITIONS);
    let mut rx = tracker.subscribe_seam();

    let mut sender = tracker.start_ingress().expect("ingress");
    for sample in fixture_profiles() {
        assert!(sender.push(sample));
    }
    drop(sender);

    assert_eq!(tracker.stop_ingress().expect("stopped"), 9);
    let outputs = drain(&mut rx);
    assert_eq!(outputs.len(), 9);
    assert_eq!(outputs.iter().filter(|out| out.valid).count(), 6);
    assert_eq!(tracker.dropped_samples(), 0);
}

#[test]
fn test_offsets_and_task_switch_mid_stream() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tracker = tracker_in(dir.path(), DEFINITIONS);
    let samples: Vec<_> = fixture_profiles()
        .into_iter()
        .filter(|sample| !sample.is_empty())
        .collect();

    for sample in &samples[..3] {
        tracker.process_sample(sample).expect("processed");
    }
    tracker.offsets().set(Some(-1.0), None).expect("offsets");
    let shifted = tracker.process_sample(&samples[3]).expect("processed");
    assert!(shifted.valid);
    assert!((shifted.x - (4.2 - 1.0)).abs() < 1e-9);

    tracker.select_task(1).expect("select");
    let after_switch: Vec<bool> = samples[4..]
        .iter()
        .map(|sample| tracker.process_sample(sample).expect("processed").valid)
        .collect();
    assert_eq!(after_switch, vec![false, false, true, true]);

    let last = tracker.process_sample(&samples[7]).expect("processed");
    assert!((last.x - (10.0 + 0.7 - 1.0)).abs() < 1e-9);
}

#[test]
fn test_without_definitions_every_output_is_invalid() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tracker = tracker_in(dir.path(), "[]");

    for sample in fixture_profiles() {
        let out = tracker.process_sample(&sample).expect("processed");
        assert!(!out.valid);
    }
    assert!(tracker.telemetry().snapshot().cycles >= 9);
}
