//! Integration tests for config hot-swap, input loading and replay runs.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use chrono::{DateTime, Utc};
use infrawatch::cli::{load_history, load_observations, load_stage_input, run_replay};
use infrawatch::config::ConfigHandle;
use infrawatch_core::{
    InfraWatchError, MetricsSnapshot, Observation, SignalType, StageMetricsSnapshot, ValueRange,
};
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

fn day(d: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_735_689_600 + d * 86_400, 0).unwrap()
}

fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn write_json(dir: &TempDir, name: &str, value: &impl serde::Serialize) -> std::path::PathBuf {
    write_file(dir, name, &serde_json::to_string(value).unwrap())
}

/// Daily snapshots; coverage low steps from 0.2 to 0.35 on day 7.
fn crossing_history() -> Vec<MetricsSnapshot> {
    (0..15)
        .map(|d| {
            let low = if d < 7 { 0.2 } else { 0.35 };
            MetricsSnapshot::new(day(d)).with_coverage(ValueRange::new(low, 0.5).unwrap())
        })
        .collect()
}

// =============================================================================
// CONFIG TESTS
// =============================================================================

#[test]
fn test_config_loaded_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[stage]\ncoverage_sustainable = 1.2").unwrap();

    let handle = ConfigHandle::open(Some(file.path())).unwrap();
    assert!((handle.current().stage.coverage_sustainable - 1.2).abs() < f64::EPSILON);
    assert_eq!(handle.source(), Some(file.path()));
}

#[test]
fn test_config_missing_file_is_error() {
    let result = ConfigHandle::open(Some(Path::new("/nonexistent/infrawatch.toml")));
    assert!(matches!(result, Err(InfraWatchError::IoError(_))));
}

#[test]
fn test_reload_swaps_changed_config() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "thresholds.toml", "[signals]\nprice_move_high = 0.1\n");
    let handle = ConfigHandle::open(Some(&path)).unwrap();

    assert!(!handle.reload().unwrap());

    write_file(&dir, "thresholds.toml", "[signals]\nprice_move_high = 0.2\n");
    assert!(handle.reload().unwrap());
    assert!((handle.current().signals.price_move_high - 0.2).abs() < f64::EPSILON);
}

#[test]
fn test_reload_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "thresholds.toml", "[stage]\ncoverage_healthy = 0.7\n");
    let handle = ConfigHandle::open(Some(&path)).unwrap();
    let before = handle.current();

    write_file(&dir, "thresholds.toml", "[stage]\ncoverage_healthy = 0.1\n");
    assert!(handle.reload().is_err());
    assert_eq!(*handle.current(), *before);
}

// =============================================================================
// INPUT LOADING TESTS
// =============================================================================

#[test]
fn test_stage_input_accepts_full_snapshot() {
    let dir = TempDir::new().unwrap();
    let snapshot =
        MetricsSnapshot::new(day(0)).with_coverage(ValueRange::new(0.4, 0.6).unwrap());
    let path = write_json(&dir, "snapshot.json", &snapshot);

    let stage = load_stage_input(&path).unwrap();
    assert_eq!(stage.coverage_low, Some(0.4));
    assert_eq!(stage.coverage_high, Some(0.6));
}

#[test]
fn test_stage_input_accepts_bare_inputs() {
    let dir = TempDir::new().unwrap();
    let inputs = StageMetricsSnapshot::empty(day(0))
        .with_coverage(0.1, 0.2)
        .with_growth_streak(4);
    let path = write_json(&dir, "inputs.json", &inputs);

    assert_eq!(load_stage_input(&path).unwrap(), inputs);
}

#[test]
fn test_malformed_input_is_deserialization_error() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "broken.json", "{\"captured_at\": 42");

    let result = load_stage_input(&path);
    assert!(matches!(result, Err(InfraWatchError::DeserializationError(_))));
}

#[test]
fn test_stage_input_reports_range_violation() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "snapshot.json",
        r#"{"captured_at": "2025-01-01T00:00:00Z", "coverage": {"low": 0.9, "high": 0.2}}"#,
    );

    match load_stage_input(&path) {
        Err(InfraWatchError::DeserializationError(message)) => {
            assert!(message.contains("exceeds high"), "{message}");
            assert!(!message.contains("unknown field"), "{message}");
        }
        other => panic!("expected a range error, got {other:?}"),
    }
}

#[test]
fn test_stage_input_without_coverage_accepted() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "inputs.json",
        r#"{"captured_at": "2025-01-01T00:00:00Z", "growth_streak": 3}"#,
    );

    let stage = load_stage_input(&path).unwrap();
    assert_eq!(stage.growth_streak, Some(3));
    assert_eq!(stage.coverage_low, None);
}

#[test]
fn test_inverted_range_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "history.json",
        r#"[{"captured_at": "2025-01-01T00:00:00Z", "coverage": {"low": 0.9, "high": 0.2}}]"#,
    );

    assert!(load_history(&path).is_err());
}

#[test]
fn test_duplicate_capture_instant_rejected() {
    let dir = TempDir::new().unwrap();
    let snapshots = vec![MetricsSnapshot::new(day(0)), MetricsSnapshot::new(day(0))];
    let path = write_json(&dir, "history.json", &snapshots);

    assert!(matches!(
        load_history(&path),
        Err(InfraWatchError::ShapeMismatch(_))
    ));
}

#[test]
fn test_observations_loaded() {
    let dir = TempDir::new().unwrap();
    let observations = vec![
        Observation::new("h100", "aws", 2.5),
        Observation::new("a100", "gcp", 1.2),
    ];
    let path = write_json(&dir, "observations.json", &observations);

    assert_eq!(load_observations(&path).unwrap(), observations);
}

// =============================================================================
// REPLAY TESTS
// =============================================================================

#[test]
fn test_replay_reports_every_overlapping_crossing() {
    let dir = TempDir::new().unwrap();
    let path = write_json(&dir, "history.json", &crossing_history());
    let history = load_history(&path).unwrap();
    let handle = ConfigHandle::open(None).unwrap();

    let run = run_replay(&handle, &history, false, false).unwrap();
    assert_eq!(run.cycles.len(), 15);

    let crossings: usize = run
        .cycles
        .iter()
        .flat_map(|c| &c.signals)
        .filter(|s| s.signal_type == SignalType::ThresholdCrossing.as_str())
        .count();
    assert_eq!(crossings, 7);
}

#[test]
fn test_replay_dedup_keeps_first_crossing() {
    let dir = TempDir::new().unwrap();
    let path = write_json(&dir, "history.json", &crossing_history());
    let history = load_history(&path).unwrap();
    let handle = ConfigHandle::open(None).unwrap();

    let run = run_replay(&handle, &history, true, false).unwrap();

    let surfaced: Vec<_> = run
        .cycles
        .iter()
        .filter(|c| !c.signals.is_empty())
        .map(|c| c.captured_at.clone())
        .collect();
    assert_eq!(surfaced, vec![day(7).to_rfc3339()]);

    let suppressed: usize = run.cycles.iter().map(|c| c.suppressed).sum();
    assert_eq!(suppressed, 6);
}

#[test]
fn test_dedup_does_not_change_checksum() {
    let history = infrawatch_core::SnapshotHistory::from_snapshots(crossing_history()).unwrap();
    let handle = ConfigHandle::open(None).unwrap();

    let raw = run_replay(&handle, &history, false, false).unwrap();
    let deduped = run_replay(&handle, &history, true, false).unwrap();
    assert_eq!(raw.replay_checksum, deduped.replay_checksum);
    assert_eq!(raw.cycles[7].checksum, deduped.cycles[7].checksum);
}

#[test]
fn test_replay_picks_up_config_change() {
    let dir = TempDir::new().unwrap();
    let config_path = write_file(&dir, "thresholds.toml", "");
    let handle = ConfigHandle::open(Some(&config_path)).unwrap();

    write_file(
        &dir,
        "thresholds.toml",
        "[signals]\ncoverage_boundaries = [0.5]\n",
    );

    let history = infrawatch_core::SnapshotHistory::from_snapshots(crossing_history()).unwrap();
    let run = run_replay(&handle, &history, false, true).unwrap();

    assert_eq!(run.config_reloads, 1);
    assert!(run.cycles.iter().all(|c| c.signals.is_empty()));
}

#[test]
fn test_replay_survives_bad_reload() {
    let dir = TempDir::new().unwrap();
    let config_path = write_file(&dir, "thresholds.toml", "");
    let handle = ConfigHandle::open(Some(&config_path)).unwrap();

    write_file(&dir, "thresholds.toml", "[signals]\ncoverage_boundaries = []\n");

    let history = infrawatch_core::SnapshotHistory::from_snapshots(crossing_history()).unwrap();
    let run = run_replay(&handle, &history, false, true).unwrap();

    assert_eq!(run.config_reloads, 0);
    assert_eq!(run.cycles.len(), 15);
}
