//! # Engine Configuration
//!
//! The immutable threshold and weight tables every evaluation reads.
//!
//! A config is plain data: the binary deserializes it (TOML), calls
//! [`EngineConfig::validate`] once, and hands an `Arc` of it to the engine.
//! A config that fails validation must never reach a cycle, since a bad table
//! silently corrupts every classification that follows.

use crate::InfraWatchError;
use crate::thresholds::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// STAGE THRESHOLDS
// =============================================================================

/// Thresholds for the stage rules. See [`crate::thresholds`] for operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageThresholds {
    pub coverage_critical: f64,
    pub coverage_healthy: f64,
    pub coverage_sustainable: f64,
    pub deflation_severe: f64,
    pub spot_discount_excess: f64,
    pub rental_stable_band: f64,
    pub margin_stable_band: f64,
    pub supply_tight: f64,
    pub growth_min_streak: u32,
    pub s0_min_conditions: usize,
}

impl Default for StageThresholds {
    fn default() -> Self {
        Self {
            coverage_critical: COVERAGE_CRITICAL,
            coverage_healthy: COVERAGE_HEALTHY,
            coverage_sustainable: COVERAGE_SUSTAINABLE,
            deflation_severe: DEFLATION_SEVERE,
            spot_discount_excess: SPOT_DISCOUNT_EXCESS,
            rental_stable_band: RENTAL_STABLE_BAND,
            margin_stable_band: MARGIN_STABLE_BAND,
            supply_tight: SUPPLY_TIGHT,
            growth_min_streak: GROWTH_MIN_STREAK,
            s0_min_conditions: S0_MIN_CONDITIONS,
        }
    }
}

impl StageThresholds {
    /// Number of S0 sub-conditions defined by the rules.
    pub const S0_CONDITION_COUNT: usize = 3;

    fn validate(&self) -> Result<(), InfraWatchError> {
        for (name, value) in [
            ("coverage_critical", self.coverage_critical),
            ("coverage_healthy", self.coverage_healthy),
            ("coverage_sustainable", self.coverage_sustainable),
            ("deflation_severe", self.deflation_severe),
            ("spot_discount_excess", self.spot_discount_excess),
            ("rental_stable_band", self.rental_stable_band),
            ("margin_stable_band", self.margin_stable_band),
            ("supply_tight", self.supply_tight),
        ] {
            ensure_positive(&format!("stage.{name}"), value)?;
        }

        if !(self.coverage_critical < self.coverage_healthy
            && self.coverage_healthy < self.coverage_sustainable)
        {
            return Err(InfraWatchError::InvalidConfig(format!(
                "stage coverage thresholds must be strictly increasing \
                 (critical={}, healthy={}, sustainable={})",
                self.coverage_critical, self.coverage_healthy, self.coverage_sustainable
            )));
        }

        // At least two, so a single dominant metric can never trigger S0 alone.
        if self.s0_min_conditions < 2 || self.s0_min_conditions > Self::S0_CONDITION_COUNT {
            return Err(InfraWatchError::InvalidConfig(format!(
                "stage.s0_min_conditions must be within 2..={}, got {}",
                Self::S0_CONDITION_COUNT,
                self.s0_min_conditions
            )));
        }

        if self.growth_min_streak == 0 {
            return Err(InfraWatchError::InvalidConfig(
                "stage.growth_min_streak must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// SIGNAL THRESHOLDS
// =============================================================================

/// Which coverage bound a downward crossing is measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingBasis {
    /// Both directions on the lower bound:
    /// up `prev.low < b <= cur.low`, down `prev.low >= b > cur.low`.
    #[default]
    LowerBound,
    /// Up on the lower bound, down on the upper bound:
    /// up `prev.low < b <= cur.low`, down `prev.high >= b > cur.high`.
    Envelope,
}

/// Thresholds for the signal detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignalThresholds {
    pub price_move_high: f64,
    pub price_move_medium: f64,
    pub coverage_boundaries: Vec<f64>,
    pub crossing_basis: CrossingBasis,
    pub supply_shift_min_change: f64,
    pub adoption_inflection_min_change: f64,
    pub comparison_lookback_days: i64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            price_move_high: PRICE_MOVE_HIGH,
            price_move_medium: PRICE_MOVE_MEDIUM,
            coverage_boundaries: COVERAGE_BOUNDARIES.to_vec(),
            crossing_basis: CrossingBasis::default(),
            supply_shift_min_change: SUPPLY_SHIFT_MIN_CHANGE,
            adoption_inflection_min_change: ADOPTION_INFLECTION_MIN_CHANGE,
            comparison_lookback_days: COMPARISON_LOOKBACK_DAYS,
        }
    }
}

impl SignalThresholds {
    fn validate(&self) -> Result<(), InfraWatchError> {
        ensure_positive("signals.price_move_high", self.price_move_high)?;
        ensure_positive("signals.price_move_medium", self.price_move_medium)?;
        ensure_positive("signals.supply_shift_min_change", self.supply_shift_min_change)?;
        ensure_positive(
            "signals.adoption_inflection_min_change",
            self.adoption_inflection_min_change,
        )?;

        if self.price_move_medium >= self.price_move_high {
            return Err(InfraWatchError::InvalidConfig(format!(
                "signals.price_move_medium ({}) must be below price_move_high ({})",
                self.price_move_medium, self.price_move_high
            )));
        }

        if self.coverage_boundaries.is_empty() {
            return Err(InfraWatchError::InvalidConfig(
                "signals.coverage_boundaries must not be empty".to_string(),
            ));
        }
        for value in &self.coverage_boundaries {
            ensure_positive("signals.coverage_boundaries", *value)?;
        }
        if self.coverage_boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(InfraWatchError::InvalidConfig(format!(
                "signals.coverage_boundaries must be strictly increasing, got {:?}",
                self.coverage_boundaries
            )));
        }

        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.comparison_lookback_days) {
            return Err(InfraWatchError::InvalidConfig(format!(
                "signals.comparison_lookback_days must be in 1..={}, got {}",
                MAX_LOOKBACK_DAYS, self.comparison_lookback_days
            )));
        }

        Ok(())
    }
}

// =============================================================================
// COVERAGE ASSUMPTIONS
// =============================================================================

/// Assumptions used to turn revenue and capex into a coverage range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoverageAssumptions {
    /// Smallest assumed share of capex going to AI infrastructure.
    pub allocation_low: f64,
    /// Largest assumed share of capex going to AI infrastructure.
    pub allocation_high: f64,
    /// Depreciation period, in the same unit as the revenue period.
    pub depreciation_periods: f64,
}

impl Default for CoverageAssumptions {
    fn default() -> Self {
        Self {
            allocation_low: CAPEX_ALLOCATION_LOW,
            allocation_high: CAPEX_ALLOCATION_HIGH,
            depreciation_periods: DEPRECIATION_PERIODS,
        }
    }
}

impl CoverageAssumptions {
    fn validate(&self) -> Result<(), InfraWatchError> {
        ensure_positive("coverage.allocation_low", self.allocation_low)?;
        ensure_positive("coverage.allocation_high", self.allocation_high)?;
        ensure_positive("coverage.depreciation_periods", self.depreciation_periods)?;

        if self.allocation_low > self.allocation_high || self.allocation_high > 1.0 {
            return Err(InfraWatchError::InvalidConfig(format!(
                "coverage allocation band must satisfy 0 < low <= high <= 1 (low={}, high={})",
                self.allocation_low, self.allocation_high
            )));
        }
        Ok(())
    }
}

// =============================================================================
// INDEX FAMILIES (WEIGHT TABLES)
// =============================================================================

/// A named weighted index and its static weight table.
///
/// Weight keys are `entity/sub_key` or a bare `entity`; see
/// [`IndexFamily::weight_for`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexFamily {
    pub name: String,
    pub weights: BTreeMap<String, f64>,
}

impl IndexFamily {
    #[must_use]
    pub fn new(name: impl Into<String>, weights: &[(&str, f64)]) -> Self {
        Self {
            name: name.into(),
            weights: weights
                .iter()
                .map(|(k, w)| ((*k).to_string(), *w))
                .collect(),
        }
    }

    /// Weight for an observation: exact `entity/sub_key` first, then `entity`.
    #[must_use]
    pub fn weight_for(&self, entity: &str, sub_key: &str) -> Option<f64> {
        self.weights
            .get(&format!("{entity}/{sub_key}"))
            .or_else(|| self.weights.get(entity))
            .copied()
    }

    fn validate(&self) -> Result<(), InfraWatchError> {
        if self.name.trim().is_empty() {
            return Err(InfraWatchError::InvalidConfig(
                "index family name must not be empty".to_string(),
            ));
        }
        for (key, weight) in &self.weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(InfraWatchError::InvalidConfig(format!(
                    "index '{}': weight for '{}' must be finite and non-negative, got {}",
                    self.name, key, weight
                )));
            }
        }
        Ok(())
    }
}

fn default_indices() -> Vec<IndexFamily> {
    vec![
        IndexFamily::new(
            "inference_price_index",
            &[("openai/gpt-4o", 0.4), ("anthropic/claude-sonnet", 0.35)],
        ),
        IndexFamily::new("gpu_hourly_index", &[("h100", 0.6), ("a100", 0.4)]),
    ]
}

// =============================================================================
// ENGINE CONFIG
// =============================================================================

/// Complete, immutable engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub stage: StageThresholds,
    pub signals: SignalThresholds,
    pub coverage: CoverageAssumptions,
    pub indices: Vec<IndexFamily>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stage: StageThresholds::default(),
            signals: SignalThresholds::default(),
            coverage: CoverageAssumptions::default(),
            indices: default_indices(),
        }
    }
}

impl EngineConfig {
    /// Check every table for consistency.
    ///
    /// Returns `InfraWatchError::InvalidConfig` on the first violation.
    pub fn validate(&self) -> Result<(), InfraWatchError> {
        self.stage.validate()?;
        self.signals.validate()?;
        self.coverage.validate()?;

        let mut seen = BTreeSet::new();
        for family in &self.indices {
            family.validate()?;
            if !seen.insert(family.name.as_str()) {
                return Err(InfraWatchError::InvalidConfig(format!(
                    "duplicate index family '{}'",
                    family.name
                )));
            }
        }
        Ok(())
    }

    /// Look up an index family by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexFamily> {
        self.indices.iter().find(|f| f.name == name)
    }
}

fn ensure_positive(name: &str, value: f64) -> Result<(), InfraWatchError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(InfraWatchError::InvalidConfig(format!(
            "{name} must be a positive finite number, got {value}"
        )))
    }
}

// =============================================================================
// TESTS
// =============================================================================
