//! # Engine
//!
//! One evaluation cycle: classify the current snapshot and detect signals
//! against its comparison snapshot.
//!
//! ```text
//! observations ──aggregate──▶ MetricsSnapshot ──┬──classify──▶ StageResult
//!                                               └──detect────▶ Vec<Signal>
//! ```
//!
//! An [`Engine`] is built from a validated [`EngineConfig`] and never changes
//! it. To swap thresholds, build a new engine; a cycle already running keeps
//! the config it started with. `Engine` is `Send + Sync`, so independent
//! cycles may run on different threads.

use crate::aggregator::{self, Observation};
use crate::config::EngineConfig;
use crate::signals::SignalDetector;
use crate::snapshot::{MetricsSnapshot, SnapshotSource, StageMetricsSnapshot};
use crate::stage::{StageClassifier, StageResult};
use crate::{DerivedMetric, InfraWatchError, Scope, Signal};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Output of one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub captured_at: DateTime<Utc>,
    /// Capture instant of the comparison snapshot, if one was available.
    pub compared_with: Option<DateTime<Utc>>,
    pub stage: StageResult,
    pub signals: Vec<Signal>,
}

/// The Stage & Signal Engine.
#[derive(Debug, Clone)]
pub struct Engine {
    config: Arc<EngineConfig>,
    classifier: StageClassifier,
    detector: SignalDetector,
}

impl Engine {
    /// Build an engine, validating `config`.
    pub fn new(config: EngineConfig) -> Result<Self, InfraWatchError> {
        Self::from_shared(Arc::new(config))
    }

    /// Build an engine over a shared config, validating it.
    pub fn from_shared(config: Arc<EngineConfig>) -> Result<Self, InfraWatchError> {
        config.validate()?;
        Ok(Self {
            classifier: StageClassifier::new(config.stage.clone()),
            detector: SignalDetector::new(config.signals.clone()),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Lookback used to find the comparison snapshot.
    ///
    /// Validation bounds the day count; an unrepresentable one would mean
    /// no comparison snapshot exists.
    #[must_use]
    pub fn lookback(&self) -> Duration {
        Duration::try_days(self.config.signals.comparison_lookback_days)
            .unwrap_or(Duration::MAX)
    }

    /// Classify a stage snapshot.
    #[must_use]
    pub fn classify(&self, snapshot: &StageMetricsSnapshot) -> StageResult {
        self.classifier.determine(snapshot)
    }

    /// Detect signals between two snapshots.
    pub fn detect_signals(
        &self,
        current: &MetricsSnapshot,
        previous: &MetricsSnapshot,
    ) -> Result<Vec<Signal>, InfraWatchError> {
        self.detector.detect(current, previous)
    }

    /// Weighted index over the named family's weight table.
    pub fn aggregate(
        &self,
        observations: &[Observation],
        family: &str,
    ) -> Result<DerivedMetric, InfraWatchError> {
        let family = self.config.index(family).ok_or_else(|| {
            InfraWatchError::InvalidConfig(format!("unknown index family '{family}'"))
        })?;
        Ok(aggregator::aggregate(observations, family))
    }

    /// Coverage range under the configured assumptions.
    #[must_use]
    pub fn coverage(
        &self,
        revenue: Option<f64>,
        capex: Option<f64>,
        scope: Scope,
    ) -> DerivedMetric {
        aggregator::coverage_ratio(revenue, capex, &self.config.coverage, scope)
    }

    /// Run one cycle on `current`.
    ///
    /// Without a comparison snapshot only the classifier runs.
    pub fn evaluate(
        &self,
        current: &MetricsSnapshot,
        previous: Option<&MetricsSnapshot>,
    ) -> Result<CycleOutcome, InfraWatchError> {
        current.validate()?;

        let signals = match previous {
            Some(previous) => self.detect_signals(current, previous)?,
            None => Vec::new(),
        };

        Ok(CycleOutcome {
            captured_at: current.captured_at,
            compared_with: previous.map(|p| p.captured_at),
            stage: self.classify(&current.stage_metrics()),
            signals,
        })
    }

    /// Run one cycle on the latest snapshot of `source`.
    ///
    /// Returns `None` when the source is empty.
    pub fn evaluate_latest(
        &self,
        source: &impl SnapshotSource,
    ) -> Result<Option<CycleOutcome>, InfraWatchError> {
        let Some(current) = source.latest() else {
            return Ok(None);
        };
        let previous = source.comparison_for(current, self.lookback());
        self.evaluate(current, previous).map(Some)
    }
}

// =============================================================================
// FREE FUNCTIONS
// =============================================================================

/// Classify `snapshot` under `config`'s stage thresholds.
#[must_use]
pub fn classify(snapshot: &StageMetricsSnapshot, config: &EngineConfig) -> StageResult {
    StageClassifier::new(config.stage.clone()).determine(snapshot)
}

/// Detect signals under `config`, validating it first.
pub fn detect_signals(
    current: &MetricsSnapshot,
    previous: &MetricsSnapshot,
    config: &EngineConfig,
) -> Result<Vec<Signal>, InfraWatchError> {
    config.validate()?;
    SignalDetector::new(config.signals.clone()).detect(current, previous)
}
