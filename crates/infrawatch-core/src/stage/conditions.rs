//! Named, typed sub-conditions of the stage rules.
//!
//! Each stage owns an ordered list of predicates. Gate conditions decide the
//! stage; support conditions only adjust confidence.

use crate::Truth;
use crate::config::StageThresholds;
use crate::snapshot::StageMetricsSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of a single stage sub-condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    /// S0: `coverage_high < coverage_critical`
    CoverageCollapse,
    /// S0: `qoq_deflation > deflation_severe`
    PriceCollapse,
    /// S0: `spot_discount > spot_discount_excess`
    CapacityExcess,
    /// S3: `coverage_low >= coverage_sustainable`
    CoverageSustainable,
    /// S3 support: `|margin_qoq| < margin_stable_band`
    MarginStable,
    /// S2: `coverage_low > coverage_healthy`
    CoverageHealthy,
    /// S2: `|rental_qoq| < rental_stable_band`
    RentalStable,
    /// S2 support: `supply_tightness < supply_tight`
    SupplyStable,
    /// S1: `coverage_critical <= coverage_high` and `coverage_low <= coverage_healthy`
    CoverageTransition,
    /// S1: `growth_streak >= growth_min_streak`
    AdoptionGrowing,
}

impl ConditionKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionKind::CoverageCollapse => "coverage_collapse",
            ConditionKind::PriceCollapse => "price_collapse",
            ConditionKind::CapacityExcess => "capacity_excess",
            ConditionKind::CoverageSustainable => "coverage_sustainable",
            ConditionKind::MarginStable => "margin_stable",
            ConditionKind::CoverageHealthy => "coverage_healthy",
            ConditionKind::RentalStable => "rental_stable",
            ConditionKind::SupplyStable => "supply_stable",
            ConditionKind::CoverageTransition => "coverage_transition",
            ConditionKind::AdoptionGrowing => "adoption_growing",
        }
    }
}

impl std::fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a condition decides the stage or only informs confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionRole {
    Gate,
    Support,
}

/// One evaluated sub-condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    pub kind: ConditionKind,
    pub role: ConditionRole,
    pub truth: Truth,
}

/// Ordered list of evaluated conditions for one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionSet {
    conditions: Vec<Condition>,
}

impl ConditionSet {
    fn gate(mut self, kind: ConditionKind, truth: Truth) -> Self {
        self.conditions.push(Condition {
            kind,
            role: ConditionRole::Gate,
            truth,
        });
        self
    }

    fn support(mut self, kind: ConditionKind, truth: Truth) -> Self {
        self.conditions.push(Condition {
            kind,
            role: ConditionRole::Support,
            truth,
        });
        self
    }

    /// All conditions in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter()
    }

    /// Gate conditions in evaluation order.
    pub fn gates(&self) -> impl Iterator<Item = &Condition> {
        self.conditions
            .iter()
            .filter(|c| c.role == ConditionRole::Gate)
    }

    /// Truth of `kind`, `Unknown` if the set does not contain it.
    #[must_use]
    pub fn truth(&self, kind: ConditionKind) -> Truth {
        self.conditions
            .iter()
            .find(|c| c.kind == kind)
            .map_or(Truth::Unknown, |c| c.truth)
    }

    /// Number of gate conditions.
    #[must_use]
    pub fn gate_count(&self) -> usize {
        self.gates().count()
    }

    /// Number of gate conditions that are `True`.
    #[must_use]
    pub fn gates_satisfied(&self) -> usize {
        self.gates().filter(|c| c.truth.is_satisfied()).count()
    }

    /// Every gate is `True`.
    #[must_use]
    pub fn all_gates_satisfied(&self) -> bool {
        self.gate_count() > 0 && self.gates_satisfied() == self.gate_count()
    }

    /// Known conditions as a name → bool map. `Unknown` entries are left out.
    #[must_use]
    pub fn known(&self) -> BTreeMap<ConditionKind, bool> {
        self.conditions
            .iter()
            .filter_map(|c| c.truth.known().map(|value| (c.kind, value)))
            .collect()
    }

    /// Gates only, support conditions dropped.
    #[must_use]
    pub fn gates_only(&self) -> Self {
        self.gates()
            .fold(Self::default(), |set, c| set.gate(c.kind, c.truth))
    }

    /// Gates only, each negated.
    #[must_use]
    pub fn negated_gates(&self) -> Self {
        self.gates()
            .fold(Self::default(), |set, c| set.gate(c.kind, c.truth.negate()))
    }
}

// =============================================================================
// PER-STAGE CONDITION LISTS
// =============================================================================

/// S0: unsustainable. All three are gates.
#[must_use]
pub fn s0_conditions(m: &StageMetricsSnapshot, t: &StageThresholds) -> ConditionSet {
    ConditionSet::default()
        .gate(
            ConditionKind::CoverageCollapse,
            Truth::test(m.coverage_high, |v| v < t.coverage_critical),
        )
        .gate(
            ConditionKind::PriceCollapse,
            Truth::test(m.qoq_deflation, |v| v > t.deflation_severe),
        )
        .gate(
            ConditionKind::CapacityExcess,
            Truth::test(m.spot_discount, |v| v > t.spot_discount_excess),
        )
}

/// S3: mature. Coverage gates, margin stability supports.
#[must_use]
pub fn s3_conditions(m: &StageMetricsSnapshot, t: &StageThresholds) -> ConditionSet {
    ConditionSet::default()
        .gate(
            ConditionKind::CoverageSustainable,
            Truth::test(m.coverage_low, |v| v >= t.coverage_sustainable),
        )
        .support(
            ConditionKind::MarginStable,
            Truth::test(m.margin_qoq, |v| v.abs() < t.margin_stable_band),
        )
}

/// S2: early self-funding. Coverage and rental stability gate, supply supports.
#[must_use]
pub fn s2_conditions(m: &StageMetricsSnapshot, t: &StageThresholds) -> ConditionSet {
    ConditionSet::default()
        .gate(
            ConditionKind::CoverageHealthy,
            Truth::test(m.coverage_low, |v| v > t.coverage_healthy),
        )
        .gate(
            ConditionKind::RentalStable,
            Truth::test(m.rental_qoq, |v| v.abs() < t.rental_stable_band),
        )
        .support(
            ConditionKind::SupplyStable,
            Truth::test(m.supply_tightness, |v| v < t.supply_tight),
        )
}

/// S1: transition. These never gate S1 (it is the fallback); they explain it.
#[must_use]
pub fn s1_conditions(m: &StageMetricsSnapshot, t: &StageThresholds) -> ConditionSet {
    let band = Truth::test(m.coverage_high, |v| t.coverage_critical <= v)
        .and(Truth::test(m.coverage_low, |v| v <= t.coverage_healthy));
    let streak = Truth::from_option(m.growth_streak.map(|n| n >= t.growth_min_streak));

    ConditionSet::default()
        .gate(ConditionKind::CoverageTransition, band)
        .gate(ConditionKind::AdoptionGrowing, streak)
}
