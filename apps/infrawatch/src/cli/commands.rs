//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::ConfigHandle;
use crate::ledger::CrossingLedger;
use crate::report::{CycleReport, MetricReport, SignalReport, StageReport};
use infrawatch_core::{
    CycleOutcome, Engine, InfraWatchError, MetricsSnapshot, Observation, Scope, Signal,
    SnapshotHistory, SnapshotSource, Stage, StageMetricsSnapshot, canonical_checksum,
    canonical_crypto_hash, replay_checksum,
};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a snapshot, history or observations file (100 MB).
///
/// This prevents memory exhaustion from malicious or accidental large files.
const MAX_INPUT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum number of records (snapshots or observations) in one file.
pub const MAX_INPUT_RECORDS: usize = 100_000;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), InfraWatchError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| InfraWatchError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(InfraWatchError::DeserializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate an input path.
///
/// Canonicalizes the path (resolving symlinks and "..") and ensures it
/// names an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, InfraWatchError> {
    let canonical = path.canonicalize().map_err(|e| {
        InfraWatchError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(InfraWatchError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Validate, size-check and read an input file.
fn read_input(path: &Path) -> Result<Vec<u8>, InfraWatchError> {
    let validated_path = validate_file_path(path)?;
    validate_file_size(&validated_path, MAX_INPUT_FILE_SIZE)?;
    std::fs::read(&validated_path)
        .map_err(|e| InfraWatchError::IoError(format!("Read file: {}", e)))
}

fn parse_json<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T, InfraWatchError> {
    serde_json::from_slice(bytes).map_err(|e| {
        InfraWatchError::DeserializationError(format!("'{}': {}", path.display(), e))
    })
}

fn ensure_record_count(path: &Path, count: usize) -> Result<(), InfraWatchError> {
    if count > MAX_INPUT_RECORDS {
        return Err(InfraWatchError::DeserializationError(format!(
            "'{}': record count {} exceeds maximum allowed {}",
            path.display(),
            count,
            MAX_INPUT_RECORDS
        )));
    }
    Ok(())
}

// =============================================================================
// INPUT LOADERS
// =============================================================================

/// Load one full metrics snapshot.
pub fn load_snapshot(path: &Path) -> Result<MetricsSnapshot, InfraWatchError> {
    let bytes = read_input(path)?;
    let snapshot: MetricsSnapshot = parse_json(path, &bytes)?;
    snapshot.validate()?;
    Ok(snapshot)
}

/// Load classifier inputs.
///
/// Accepts either a full metrics snapshot or a bare stage-inputs record.
/// A record with `coverage_low` or `coverage_high` is stage inputs; anything
/// else is parsed as a full snapshot.
pub fn load_stage_input(path: &Path) -> Result<StageMetricsSnapshot, InfraWatchError> {
    let bytes = read_input(path)?;
    let value: serde_json::Value = parse_json(path, &bytes)?;

    let is_stage_inputs = value.as_object().is_some_and(|record| {
        record.contains_key("coverage_low") || record.contains_key("coverage_high")
    });

    let parse_error = |e: serde_json::Error| {
        InfraWatchError::DeserializationError(format!("'{}': {}", path.display(), e))
    };
    if is_stage_inputs {
        return serde_json::from_value(value).map_err(parse_error);
    }

    let snapshot: MetricsSnapshot = serde_json::from_value(value).map_err(parse_error)?;
    snapshot.validate()?;
    Ok(snapshot.stage_metrics())
}

/// Load a snapshot history (JSON array of snapshots).
pub fn load_history(path: &Path) -> Result<SnapshotHistory, InfraWatchError> {
    let bytes = read_input(path)?;
    let snapshots: Vec<MetricsSnapshot> = parse_json(path, &bytes)?;
    ensure_record_count(path, snapshots.len())?;
    SnapshotHistory::from_snapshots(snapshots)
}

/// Load observations (JSON array).
pub fn load_observations(path: &Path) -> Result<Vec<Observation>, InfraWatchError> {
    let bytes = read_input(path)?;
    let observations: Vec<Observation> = parse_json(path, &bytes)?;
    ensure_record_count(path, observations.len())?;
    Ok(observations)
}

fn engine_for(handle: &ConfigHandle) -> Result<Engine, InfraWatchError> {
    Engine::from_shared(handle.current())
}

fn print_json(value: &impl serde::Serialize) -> Result<(), InfraWatchError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| InfraWatchError::SerializationError(format!("JSON output: {}", e)))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// CLASSIFY COMMAND
// =============================================================================

/// Classify a snapshot.
pub fn cmd_classify(
    handle: &ConfigHandle,
    json_mode: bool,
    file: &Path,
) -> Result<(), InfraWatchError> {
    let engine = engine_for(handle)?;
    let stage = load_stage_input(file)?;
    let result = engine.classify(&stage);

    tracing::info!(
        stage = ?result.stage,
        confidence = result.confidence.as_str(),
        "Snapshot classified"
    );

    let report = StageReport::from(&result);
    if json_mode {
        print_json(&report)?;
        return Ok(());
    }

    print_stage(&report);
    Ok(())
}

// =============================================================================
// DETECT COMMAND
// =============================================================================

/// Detect signals between two snapshots.
pub fn cmd_detect(
    handle: &ConfigHandle,
    json_mode: bool,
    current: &Path,
    previous: &Path,
) -> Result<(), InfraWatchError> {
    let engine = engine_for(handle)?;
    let current = load_snapshot(current)?;
    let previous = load_snapshot(previous)?;
    let signals = engine.detect_signals(&current, &previous)?;

    tracing::info!(count = signals.len(), "Signals detected");

    let reports: Vec<SignalReport> = signals.iter().map(SignalReport::from).collect();
    if json_mode {
        print_json(&reports)?;
        return Ok(());
    }

    print_signals(&reports);
    Ok(())
}

// =============================================================================
// EVALUATE COMMAND
// =============================================================================

/// Run one cycle.
pub fn cmd_evaluate(
    handle: &ConfigHandle,
    json_mode: bool,
    current: &Path,
    previous: Option<&Path>,
) -> Result<(), InfraWatchError> {
    let engine = engine_for(handle)?;
    let current = load_snapshot(current)?;
    let previous = previous.map(load_snapshot).transpose()?;
    let outcome = engine.evaluate(&current, previous.as_ref())?;

    let report = cycle_report(&outcome, &outcome.signals, 0)?;
    tracing::info!(
        stage = ?outcome.stage.stage,
        signals = outcome.signals.len(),
        checksum = %report.checksum,
        "Cycle evaluated"
    );

    if json_mode {
        print_json(&report)?;
        return Ok(());
    }

    print_cycle(&report);
    Ok(())
}

// =============================================================================
// AGGREGATE COMMAND
// =============================================================================

/// Build a weighted index.
pub fn cmd_aggregate(
    handle: &ConfigHandle,
    json_mode: bool,
    file: &Path,
    family: &str,
) -> Result<(), InfraWatchError> {
    let engine = engine_for(handle)?;
    let observations = load_observations(file)?;
    let metric = engine.aggregate(&observations, family)?;

    if metric.is_absent() {
        tracing::warn!(family, "No observation matched the index weights");
    }

    let report = MetricReport::from(&metric);
    if json_mode {
        print_json(&report)?;
        return Ok(());
    }

    print_metric(&report);
    Ok(())
}

// =============================================================================
// COVERAGE COMMAND
// =============================================================================

/// Compute a coverage range.
pub fn cmd_coverage(
    handle: &ConfigHandle,
    json_mode: bool,
    revenue: f64,
    capex: f64,
    entity: Option<String>,
) -> Result<(), InfraWatchError> {
    let engine = engine_for(handle)?;
    let scope = entity.map(Scope::entity).unwrap_or_default();
    let metric = engine.coverage(Some(revenue), Some(capex), scope);

    if metric.is_absent() {
        tracing::warn!(revenue, capex, "Coverage undefined for these inputs");
    }

    let report = MetricReport::from(&metric);
    if json_mode {
        print_json(&report)?;
        return Ok(());
    }

    print_metric(&report);
    Ok(())
}

// =============================================================================
// REPLAY COMMAND
// =============================================================================

/// Result of a replay run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReplayRun {
    pub cycles: Vec<CycleReport>,
    /// Order-sensitive checksum over every raw outcome.
    pub replay_checksum: String,
    pub config_reloads: usize,
}

/// Evaluate every snapshot of `history` in capture order.
///
/// With `reload`, the config file is re-read before each cycle; an invalid
/// file is logged and the previous config stays active. With `dedup`, repeat
/// threshold crossings are dropped from the reported signals.
pub fn run_replay(
    handle: &ConfigHandle,
    history: &SnapshotHistory,
    dedup: bool,
    reload: bool,
) -> Result<ReplayRun, InfraWatchError> {
    let mut ledger = CrossingLedger::new();
    let mut outcomes: Vec<CycleOutcome> = Vec::with_capacity(history.len());
    let mut cycles = Vec::with_capacity(history.len());
    let mut config_reloads = 0;
    let mut engine = engine_for(handle)?;

    for snapshot in history.iter() {
        if reload {
            match handle.reload() {
                Ok(true) => {
                    engine = engine_for(handle)?;
                    config_reloads += 1;
                }
                Ok(false) => {}
                Err(e) => tracing::warn!("Config reload rejected, keeping current: {}", e),
            }
        }

        let previous = history.comparison_for(snapshot, engine.lookback());
        let outcome = engine.evaluate(snapshot, previous)?;

        let (signals, suppressed) = if dedup {
            ledger.filter(outcome.signals.clone())
        } else {
            (outcome.signals.clone(), 0)
        };

        tracing::debug!(
            captured_at = %outcome.captured_at,
            stage = ?outcome.stage.stage,
            signals = signals.len(),
            suppressed,
            "Cycle replayed"
        );

        cycles.push(cycle_report(&outcome, &signals, suppressed)?);
        outcomes.push(outcome);
    }

    let checksum = replay_checksum(&outcomes)?;
    Ok(ReplayRun {
        cycles,
        replay_checksum: format!("{checksum:016x}"),
        config_reloads,
    })
}

/// Replay a snapshot history.
pub fn cmd_replay(
    handle: &ConfigHandle,
    json_mode: bool,
    file: &Path,
    dedup: bool,
    reload: bool,
) -> Result<(), InfraWatchError> {
    let history = load_history(file)?;
    let run = run_replay(handle, &history, dedup, reload)?;

    let suppressed: usize = run.cycles.iter().map(|c| c.suppressed).sum();
    tracing::info!(
        cycles = run.cycles.len(),
        suppressed,
        reloads = run.config_reloads,
        checksum = %run.replay_checksum,
        "Replay complete"
    );

    if json_mode {
        print_json(&run)?;
        return Ok(());
    }

    println!("InfraWatch Replay");
    println!("=================");
    println!("Cycles:    {}", run.cycles.len());
    println!("Checksum:  {}", run.replay_checksum);
    if dedup {
        println!("Suppressed crossings: {}", suppressed);
    }
    for cycle in &run.cycles {
        println!();
        print_cycle(cycle);
    }

    Ok(())
}

// =============================================================================
// CHECK-CONFIG COMMAND
// =============================================================================

/// Validate and print the active config.
pub fn cmd_check_config(handle: &ConfigHandle, json_mode: bool) -> Result<(), InfraWatchError> {
    let config = handle.current();
    config.validate()?;

    if json_mode {
        print_json(&*config)?;
        return Ok(());
    }

    let stage = &config.stage;
    let signals = &config.signals;

    println!("InfraWatch Config");
    println!("=================");
    match handle.source() {
        Some(path) => println!("Source: {}", path.display()),
        None => println!("Source: built-in thresholds"),
    }
    println!();
    println!("Stage:");
    println!("  Coverage critical:     {}", stage.coverage_critical);
    println!("  Coverage healthy:      {}", stage.coverage_healthy);
    println!("  Coverage sustainable:  {}", stage.coverage_sustainable);
    println!("  Deflation severe:      {}", stage.deflation_severe);
    println!("  Spot discount excess:  {}", stage.spot_discount_excess);
    println!("  Rental stable band:    {}", stage.rental_stable_band);
    println!("  Margin stable band:    {}", stage.margin_stable_band);
    println!("  Supply tight:          {}", stage.supply_tight);
    println!("  Growth min streak:     {}", stage.growth_min_streak);
    println!("  S0 min conditions:     {}", stage.s0_min_conditions);
    println!();
    println!("Signals:");
    println!("  Price move high:       {}", signals.price_move_high);
    println!("  Price move medium:     {}", signals.price_move_medium);
    println!("  Coverage boundaries:   {:?}", signals.coverage_boundaries);
    println!("  Crossing basis:        {:?}", signals.crossing_basis);
    println!("  Supply shift min:      {}", signals.supply_shift_min_change);
    println!(
        "  Adoption min change:   {}",
        signals.adoption_inflection_min_change
    );
    println!(
        "  Lookback:              {} days",
        signals.comparison_lookback_days
    );
    println!();
    println!("Index families:");
    for family in &config.indices {
        println!("  {} ({} weights)", family.name, family.weights.len());
    }

    Ok(())
}

// =============================================================================
// STAGES COMMAND
// =============================================================================

/// List the lifecycle stages.
pub fn cmd_stages(json_mode: bool) -> Result<(), InfraWatchError> {
    if json_mode {
        let output: Vec<serde_json::Value> = Stage::ALL
            .iter()
            .map(|stage| {
                serde_json::json!({
                    "stage": format!("{:?}", stage),
                    "name": stage.name(),
                    "description": stage.description(),
                })
            })
            .collect();
        print_json(&output)?;
        return Ok(());
    }

    println!("InfraWatch Lifecycle Stages");
    println!("===========================");
    for stage in Stage::ALL {
        println!();
        println!("{}", stage);
        println!("  {}", stage.description());
    }

    Ok(())
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

fn cycle_report(
    outcome: &CycleOutcome,
    signals: &[Signal],
    suppressed: usize,
) -> Result<CycleReport, InfraWatchError> {
    let checksum = canonical_checksum(outcome)?;
    let blake3 = canonical_crypto_hash(outcome)?;
    Ok(CycleReport::new(outcome, signals, suppressed, checksum, blake3))
}

fn print_stage(report: &StageReport) {
    println!("Stage: {} ({})", report.stage, report.stage_name);
    println!("Confidence: {}", report.confidence);
    println!("Rationale:  {}", report.rationale);

    if !report.trigger_conditions.is_empty() {
        println!();
        println!("Conditions:");
        for (name, holds) in &report.trigger_conditions {
            println!("  {:<22} {}", name, holds);
        }
    }

    if !report.transition_risks.is_empty() {
        println!();
        println!("Transition risks:");
        for (target, risk) in &report.transition_risks {
            println!(
                "  {:<8} gap {:<10} {} ({}/{})",
                target, risk.gap, risk.probability, risk.conditions_met, risk.conditions_total
            );
        }
    }

    println!();
    println!("Inputs:");
    for (name, value) in &report.inputs {
        println!("  {:<18} {}", name, value);
    }
}

fn print_signals(reports: &[SignalReport]) {
    if reports.is_empty() {
        println!("No signals.");
        return;
    }
    for signal in reports {
        println!(
            "[{}] {} {} {}: {}",
            signal.severity, signal.signal_type, signal.direction, signal.metric, signal.description
        );
    }
}

fn print_cycle(report: &CycleReport) {
    println!("Cycle {}", report.captured_at);
    println!("Compared with: {}", report.compared_with);
    println!("Checksum: {}", report.checksum);
    println!();
    print_stage(&report.stage);
    println!();
    println!("Signals:");
    print_signals(&report.signals);
    if report.suppressed > 0 {
        println!("({} repeat crossings suppressed)", report.suppressed);
    }
}

fn print_metric(report: &MetricReport) {
    println!("{}", report.name);
    println!("{}", "=".repeat(report.name.len()));
    println!("Value:  {}", report.value);
    println!("Low:    {}", report.low);
    println!("High:   {}", report.high);
    println!("Entity: {}", report.entity);
    for (key, value) in &report.metadata {
        println!("  {:<14} {}", key, value);
    }
}
