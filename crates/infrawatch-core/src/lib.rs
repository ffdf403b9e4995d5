//! # infrawatch-core
//!
//! The deterministic Stage & Signal Engine for InfraWatch.
//!
//! This crate answers two questions about a snapshot of infrastructure
//! economics indicators:
//! - which lifecycle stage (S0..S3) the monitored domain is in, and
//! - which indicator movements since the comparison snapshot are significant.
//!
//! ## Architectural Constraints
//!
//! The engine:
//! - Is pure: no I/O, no scheduling, no storage, no wall clock
//! - Is stateless: every result is a function of (snapshot, config)
//! - Is closed: thresholds arrive as an immutable, validated config value
//! - Is deterministic: BTreeMap only, content-derived ids, instants taken
//!   from the snapshot
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod aggregator;
pub mod config;
pub mod engine;
pub mod replay;
pub mod signals;
pub mod snapshot;
pub mod stage;
pub mod thresholds;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    DerivedMetric, Direction, InfraWatchError, MetricValue, Scope, Severity, Signal, SignalId,
    SignalType, Truth, ValueRange,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use aggregator::{
    Observation, aggregate, aggregate_coverage, change_rate, coverage_ratio, growth_streak, index,
    ratio,
};
pub use config::{
    CoverageAssumptions, CrossingBasis, EngineConfig, IndexFamily, SignalThresholds,
    StageThresholds,
};
pub use engine::{CycleOutcome, Engine, classify, detect_signals};
pub use replay::{canonical_bytes, canonical_checksum, replay, replay_checksum};
pub use signals::SignalDetector;
pub use snapshot::{
    MetricsSnapshot, PriceKey, PricePoint, SnapshotHistory, SnapshotSource, StageMetricsSnapshot,
};
pub use stage::{
    ConditionKind, Confidence, RiskLevel, Stage, StageClassifier, StageResult, TransitionRisk,
};

#[cfg(feature = "crypto-hash")]
pub use replay::canonical_crypto_hash;
