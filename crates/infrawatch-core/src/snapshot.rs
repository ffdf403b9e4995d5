//! # Snapshot Module
//!
//! Input records for one evaluation cycle, and the retrieval interface the
//! engine uses to find the comparison snapshot.
//!
//! - [`MetricsSnapshot`]: the aggregated snapshot shared by classifier and detector
//! - [`StageMetricsSnapshot`]: the classifier's projection of it
//! - [`SnapshotSource`]: most-recent and time-offset lookup
//! - [`SnapshotHistory`]: in-memory, time-ordered `SnapshotSource`
//!
//! Snapshots are immutable once built. Missing fields mean *unknown*.

use crate::{InfraWatchError, ValueRange};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// PRICES
// =============================================================================

/// Identity of a tracked price series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PriceKey {
    /// Provider or vendor, e.g. `openai`, `lambda_labs`.
    pub entity: String,
    /// Model, SKU or GPU type.
    pub instrument: String,
    /// Price flavour, e.g. `input`, `output`, `hourly`.
    pub price_type: String,
}

impl PriceKey {
    #[must_use]
    pub fn new(
        entity: impl Into<String>,
        instrument: impl Into<String>,
        price_type: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            instrument: instrument.into(),
            price_type: price_type.into(),
        }
    }

    /// `entity/instrument/price_type`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}/{}/{}", self.entity, self.instrument, self.price_type)
    }
}

/// One observed price in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PricePoint {
    pub entity: String,
    pub instrument: String,
    pub price_type: String,
    pub value: f64,
}

impl PricePoint {
    #[must_use]
    pub fn new(key: PriceKey, value: f64) -> Self {
        Self {
            entity: key.entity,
            instrument: key.instrument,
            price_type: key.price_type,
            value,
        }
    }

    /// The series this point belongs to.
    #[must_use]
    pub fn key(&self) -> PriceKey {
        PriceKey::new(&self.entity, &self.instrument, &self.price_type)
    }
}

// =============================================================================
// METRICS SNAPSHOT
// =============================================================================

/// Aggregated metrics for one instant.
///
/// This is what the aggregator hands to both the classifier and the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSnapshot {
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub prices: Vec<PricePoint>,
    /// Coverage ratio range (revenue over depreciation).
    #[serde(default)]
    pub coverage: Option<ValueRange>,
    /// Quarter-over-quarter price deflation, as a positive fraction.
    #[serde(default)]
    pub qoq_deflation: Option<f64>,
    /// Spot discount against on-demand capacity prices.
    #[serde(default)]
    pub spot_discount: Option<f64>,
    /// Quarter-over-quarter rental price change.
    #[serde(default)]
    pub rental_qoq: Option<f64>,
    /// Consecutive periods of positive adoption growth.
    #[serde(default)]
    pub growth_streak: Option<u32>,
    /// Quarter-over-quarter cloud margin change.
    #[serde(default)]
    pub margin_qoq: Option<f64>,
    /// Supply chain tightness index.
    #[serde(default)]
    pub supply_tightness: Option<f64>,
    /// Adoption indicators keyed by metric name.
    #[serde(default)]
    pub adoption: BTreeMap<String, f64>,
}

impl MetricsSnapshot {
    /// An empty snapshot captured at `captured_at`.
    #[must_use]
    pub fn new(captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            prices: Vec::new(),
            coverage: None,
            qoq_deflation: None,
            spot_discount: None,
            rental_qoq: None,
            growth_streak: None,
            margin_qoq: None,
            supply_tightness: None,
            adoption: BTreeMap::new(),
        }
    }

    /// Add a price observation.
    #[must_use]
    pub fn with_price(mut self, key: PriceKey, value: f64) -> Self {
        self.prices.push(PricePoint::new(key, value));
        self
    }

    /// Set the coverage range.
    #[must_use]
    pub fn with_coverage(mut self, coverage: ValueRange) -> Self {
        self.coverage = Some(coverage);
        self
    }

    /// Set the spot discount.
    #[must_use]
    pub fn with_spot_discount(mut self, value: f64) -> Self {
        self.spot_discount = Some(value);
        self
    }

    /// Add an adoption indicator.
    #[must_use]
    pub fn with_adoption(mut self, name: impl Into<String>, value: f64) -> Self {
        self.adoption.insert(name.into(), value);
        self
    }

    /// Check the snapshot against its schema.
    ///
    /// Rejects non-finite values, empty price key parts and duplicate price
    /// series. These are caller contract violations, not missing data.
    pub fn validate(&self) -> Result<(), InfraWatchError> {
        self.price_index().map(|_| ())?;

        for (name, value) in [
            ("qoq_deflation", self.qoq_deflation),
            ("spot_discount", self.spot_discount),
            ("rental_qoq", self.rental_qoq),
            ("margin_qoq", self.margin_qoq),
            ("supply_tightness", self.supply_tightness),
        ] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(InfraWatchError::ShapeMismatch(format!(
                        "{name} must be finite, got {v}"
                    )));
                }
            }
        }

        for (name, value) in &self.adoption {
            if name.is_empty() || !value.is_finite() {
                return Err(InfraWatchError::ShapeMismatch(format!(
                    "adoption metric '{name}' must be named and finite, got {value}"
                )));
            }
        }

        Ok(())
    }

    /// Prices keyed by series, rejecting malformed or duplicate entries.
    pub fn price_index(&self) -> Result<BTreeMap<PriceKey, f64>, InfraWatchError> {
        let mut index = BTreeMap::new();
        for point in &self.prices {
            let key = point.key();
            if key.entity.is_empty() || key.instrument.is_empty() || key.price_type.is_empty() {
                return Err(InfraWatchError::ShapeMismatch(format!(
                    "price key has empty component: '{}'",
                    key.label()
                )));
            }
            if !point.value.is_finite() {
                return Err(InfraWatchError::ShapeMismatch(format!(
                    "price for '{}' must be finite, got {}",
                    key.label(),
                    point.value
                )));
            }
            let label = key.label();
            if index.insert(key, point.value).is_some() {
                return Err(InfraWatchError::ShapeMismatch(format!(
                    "duplicate price series '{label}'"
                )));
            }
        }
        Ok(index)
    }

    /// The classifier's view of this snapshot.
    #[must_use]
    pub fn stage_metrics(&self) -> StageMetricsSnapshot {
        StageMetricsSnapshot {
            captured_at: self.captured_at,
            coverage_low: self.coverage.map(|r| r.low()),
            coverage_high: self.coverage.map(|r| r.high()),
            qoq_deflation: self.qoq_deflation,
            spot_discount: self.spot_discount,
            rental_qoq: self.rental_qoq,
            growth_streak: self.growth_streak,
            margin_qoq: self.margin_qoq,
            supply_tightness: self.supply_tightness,
        }
    }
}

// =============================================================================
// STAGE METRICS SNAPSHOT
// =============================================================================

/// Fixed set of named inputs for stage classification.
///
/// Coverage bounds are independent fields: they may come from different
/// reporting periods, so no ordering between them is assumed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageMetricsSnapshot {
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub coverage_low: Option<f64>,
    #[serde(default)]
    pub coverage_high: Option<f64>,
    #[serde(default)]
    pub qoq_deflation: Option<f64>,
    #[serde(default)]
    pub spot_discount: Option<f64>,
    #[serde(default)]
    pub rental_qoq: Option<f64>,
    #[serde(default)]
    pub growth_streak: Option<u32>,
    #[serde(default)]
    pub margin_qoq: Option<f64>,
    #[serde(default)]
    pub supply_tightness: Option<f64>,
}

impl StageMetricsSnapshot {
    /// A snapshot with every metric unknown.
    #[must_use]
    pub fn empty(captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            coverage_low: None,
            coverage_high: None,
            qoq_deflation: None,
            spot_discount: None,
            rental_qoq: None,
            growth_streak: None,
            margin_qoq: None,
            supply_tightness: None,
        }
    }

    #[must_use]
    pub fn with_coverage(mut self, low: f64, high: f64) -> Self {
        self.coverage_low = Some(low);
        self.coverage_high = Some(high);
        self
    }

    #[must_use]
    pub fn with_coverage_low(mut self, low: f64) -> Self {
        self.coverage_low = Some(low);
        self
    }

    #[must_use]
    pub fn with_coverage_high(mut self, high: f64) -> Self {
        self.coverage_high = Some(high);
        self
    }

    #[must_use]
    pub fn with_qoq_deflation(mut self, value: f64) -> Self {
        self.qoq_deflation = Some(value);
        self
    }

    #[must_use]
    pub fn with_spot_discount(mut self, value: f64) -> Self {
        self.spot_discount = Some(value);
        self
    }

    #[must_use]
    pub fn with_rental_qoq(mut self, value: f64) -> Self {
        self.rental_qoq = Some(value);
        self
    }

    #[must_use]
    pub fn with_growth_streak(mut self, periods: u32) -> Self {
        self.growth_streak = Some(periods);
        self
    }

    #[must_use]
    pub fn with_margin_qoq(mut self, value: f64) -> Self {
        self.margin_qoq = Some(value);
        self
    }

    #[must_use]
    pub fn with_supply_tightness(mut self, value: f64) -> Self {
        self.supply_tightness = Some(value);
        self
    }
}

// =============================================================================
// SNAPSHOT SOURCE
// =============================================================================

/// Metric retrieval interface supplied by the persistence collaborator.
pub trait SnapshotSource {
    /// The most recent snapshot, if any.
    fn latest(&self) -> Option<&MetricsSnapshot>;

    /// The newest snapshot captured at or before `instant`.
    fn at_or_before(&self, instant: DateTime<Utc>) -> Option<&MetricsSnapshot>;

    /// The comparison snapshot for `current`, `lookback` earlier.
    fn comparison_for(
        &self,
        current: &MetricsSnapshot,
        lookback: Duration,
    ) -> Option<&MetricsSnapshot> {
        current
            .captured_at
            .checked_sub_signed(lookback)
            .and_then(|instant| self.at_or_before(instant))
    }
}

/// Time-ordered, in-memory snapshot store.
#[derive(Debug, Clone, Default)]
pub struct SnapshotHistory {
    snapshots: BTreeMap<DateTime<Utc>, MetricsSnapshot>,
}

impl SnapshotHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history, validating every snapshot.
    ///
    /// Two snapshots captured at the same instant are a shape mismatch.
    pub fn from_snapshots(
        snapshots: impl IntoIterator<Item = MetricsSnapshot>,
    ) -> Result<Self, InfraWatchError> {
        let mut history = Self::new();
        for snapshot in snapshots {
            history.insert(snapshot)?;
        }
        Ok(history)
    }

    /// Add a snapshot.
    pub fn insert(&mut self, snapshot: MetricsSnapshot) -> Result<(), InfraWatchError> {
        snapshot.validate()?;
        if self.snapshots.contains_key(&snapshot.captured_at) {
            return Err(InfraWatchError::ShapeMismatch(format!(
                "duplicate snapshot captured at {}",
                snapshot.captured_at
            )));
        }
        self.snapshots.insert(snapshot.captured_at, snapshot);
        Ok(())
    }

    /// Snapshots in capture order.
    pub fn iter(&self) -> impl Iterator<Item = &MetricsSnapshot> {
        self.snapshots.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl SnapshotSource for SnapshotHistory {
    fn latest(&self) -> Option<&MetricsSnapshot> {
        self.snapshots.values().next_back()
    }

    fn at_or_before(&self, instant: DateTime<Utc>) -> Option<&MetricsSnapshot> {
        self.snapshots
            .range(..=instant)
            .next_back()
            .map(|(_, snapshot)| snapshot)
    }
}

// =============================================================================
// TESTS
// =============================================================================
