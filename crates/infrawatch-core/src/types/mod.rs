//! # Core Type Definitions
//!
//! This module contains the shared value types of the InfraWatch engine:
//! - Three-state truth for rule evaluation (`Truth`)
//! - Derived metric values (`MetricValue`, `ValueRange`, `DerivedMetric`)
//! - Event records emitted by the detector (`Signal` and its enums)
//! - Error types (`InfraWatchError`)
//!
//! ## Determinism Guarantees
//!
//! All maps are `BTreeMap`, every enum derives `Ord`, and no type here reads
//! the wall clock. Timestamps always come from the snapshot being evaluated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// TRUTH (THREE-STATE)
// =============================================================================

/// Outcome of a single rule predicate.
///
/// A predicate over an absent metric is `Unknown`, never `False`. The
/// distinction is kept until the rule boundary, where `Unknown` collapses to
/// "not satisfied".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    /// Lift an optional boolean into a truth value.
    #[must_use]
    pub fn from_option(value: Option<bool>) -> Self {
        match value {
            Some(true) => Truth::True,
            Some(false) => Truth::False,
            None => Truth::Unknown,
        }
    }

    /// Evaluate `predicate` against `value` if the value is present and finite.
    #[must_use]
    pub fn test(value: Option<f64>, predicate: impl FnOnce(f64) -> bool) -> Self {
        Self::from_option(value.filter(|v| v.is_finite()).map(predicate))
    }

    /// Collapse to a rule outcome: only `True` satisfies.
    #[must_use]
    pub fn is_satisfied(self) -> bool {
        matches!(self, Truth::True)
    }

    /// Three-valued conjunction: any `False` wins, then any `Unknown`.
    #[must_use]
    pub fn and(self, other: Truth) -> Self {
        match (self, other) {
            (Truth::False, _) | (_, Truth::False) => Truth::False,
            (Truth::True, Truth::True) => Truth::True,
            _ => Truth::Unknown,
        }
    }

    /// Three-valued negation. `Unknown` stays `Unknown`.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }

    /// Known boolean value, `None` for `Unknown`.
    #[must_use]
    pub fn known(self) -> Option<bool> {
        match self {
            Truth::True => Some(true),
            Truth::False => Some(false),
            Truth::Unknown => None,
        }
    }
}

// =============================================================================
// METRIC VALUES
// =============================================================================

/// A closed numeric interval with `low <= high`.
///
/// The invariant is enforced by [`ValueRange::new`] and on deserialization,
/// so every `ValueRange` in the engine is well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct ValueRange {
    low: f64,
    high: f64,
}

#[derive(Deserialize)]
struct RawRange {
    low: f64,
    high: f64,
}

impl TryFrom<RawRange> for ValueRange {
    type Error = InfraWatchError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        ValueRange::new(raw.low, raw.high)
    }
}

impl ValueRange {
    /// Create a range, rejecting non-finite bounds and `low > high`.
    pub fn new(low: f64, high: f64) -> Result<Self, InfraWatchError> {
        if !low.is_finite() || !high.is_finite() {
            return Err(InfraWatchError::ShapeMismatch(format!(
                "range bounds must be finite (low={low}, high={high})"
            )));
        }
        if low > high {
            return Err(InfraWatchError::ShapeMismatch(format!(
                "range low {low} exceeds high {high}"
            )));
        }
        Ok(Self { low, high })
    }

    /// Lower bound.
    #[must_use]
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Upper bound.
    #[must_use]
    pub fn high(&self) -> f64 {
        self.high
    }

    /// Midpoint of the range.
    #[must_use]
    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }
}

/// Value carried by a derived metric: a point estimate or a bounded range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricValue {
    Point(f64),
    Range(ValueRange),
}

/// What a derived metric is about.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Scope {
    /// Entity (company, provider, index family) the metric describes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Reporting period label, e.g. `2025-Q4`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}

impl Scope {
    /// Scope for a single entity.
    #[must_use]
    pub fn entity(entity: impl Into<String>) -> Self {
        Self {
            entity: Some(entity.into()),
            period: None,
        }
    }

    /// Attach a period label.
    #[must_use]
    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self
    }
}

/// A normalized indicator produced by the aggregator.
///
/// `value` is `None` when the inputs could not support a result (no weighted
/// contributors, degenerate denominator). Absent is never reported as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetric {
    pub name: String,
    pub value: Option<MetricValue>,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl DerivedMetric {
    /// A metric with no value.
    #[must_use]
    pub fn absent(name: impl Into<String>, scope: Scope) -> Self {
        Self {
            name: name.into(),
            value: None,
            scope,
            metadata: BTreeMap::new(),
        }
    }

    /// A point-valued metric.
    #[must_use]
    pub fn point(name: impl Into<String>, value: f64, scope: Scope) -> Self {
        Self {
            name: name.into(),
            value: Some(MetricValue::Point(value)),
            scope,
            metadata: BTreeMap::new(),
        }
    }

    /// A range-valued metric.
    #[must_use]
    pub fn range(name: impl Into<String>, range: ValueRange, scope: Scope) -> Self {
        Self {
            name: name.into(),
            value: Some(MetricValue::Range(range)),
            scope,
            metadata: BTreeMap::new(),
        }
    }

    /// Add a metadata entry.
    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Whether the metric carries no value.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.value.is_none()
    }

    /// Point value, if this metric is point-valued.
    #[must_use]
    pub fn as_point(&self) -> Option<f64> {
        match self.value {
            Some(MetricValue::Point(v)) => Some(v),
            _ => None,
        }
    }

    /// Range value, if this metric is range-valued.
    #[must_use]
    pub fn as_range(&self) -> Option<ValueRange> {
        match self.value {
            Some(MetricValue::Range(r)) => Some(r),
            _ => None,
        }
    }
}

// =============================================================================
// SIGNALS
// =============================================================================

/// Kind of event a signal reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    PriceMove,
    ThresholdCrossing,
    SupplyDemandShift,
    AdoptionInflection,
}

impl SignalType {
    /// Stable identifier used in signal ids and reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::PriceMove => "price_move",
            SignalType::ThresholdCrossing => "threshold_crossing",
            SignalType::SupplyDemandShift => "supply_demand_shift",
            SignalType::AdoptionInflection => "adoption_inflection",
        }
    }
}

/// Coarse magnitude of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// Direction of the movement behind a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// `Down` for negative changes, `Up` otherwise.
    #[must_use]
    pub fn of_change(delta: f64) -> Self {
        if delta < 0.0 {
            Direction::Down
        } else {
            Direction::Up
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

/// Content-derived signal identifier.
///
/// Built from type, metric, direction and trigger instant, so replaying the
/// same snapshots yields the same ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SignalId(pub String);

impl SignalId {
    #[must_use]
    pub fn new(
        signal_type: SignalType,
        metric: &str,
        direction: Direction,
        triggered_at: DateTime<Utc>,
    ) -> Self {
        Self(format!(
            "{}:{}:{}@{}",
            signal_type.as_str(),
            metric,
            direction.as_str(),
            triggered_at.timestamp()
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SignalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A discrete, timestamped event describing a significant metric movement.
///
/// The engine only ever creates signals. `acknowledged_at` and `resolved_at`
/// are always `None` on emission and belong to downstream workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub triggered_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub severity: Severity,
    pub direction: Direction,
    /// Metric or instrument the signal refers to.
    pub metric: String,
    pub previous_value: f64,
    pub current_value: f64,
    /// Signed relative change in percent, where meaningful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    /// Boundary value for threshold crossings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    pub description: String,
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the InfraWatch engine.
///
/// Missing data is never an error. Only contract violations (bad config,
/// malformed snapshots) and I/O at the binary edge produce one.
#[derive(Debug, Error)]
pub enum InfraWatchError {
    /// Threshold or weight tables are malformed or inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A supplied snapshot does not match the expected schema.
    #[error("Snapshot shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
