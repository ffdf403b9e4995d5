//! Transition risk toward adjacent stages.
//!
//! Informational only: a risk never changes the verdict. Computed for S1 and
//! S2 results; S0 and S3 carry an empty map.

use super::Stage;
use super::conditions::{self, ConditionKind, ConditionSet};
use crate::Truth;
use crate::config::StageThresholds;
use crate::snapshot::StageMetricsSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Qualitative likelihood of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
}

/// How close the current snapshot is to triggering another stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRisk {
    /// Non-negative distance of the governing coverage bound from the
    /// threshold. `None` when that bound is unknown.
    pub gap: Option<f64>,
    pub probability: RiskLevel,
    pub conditions_met: usize,
    pub conditions_total: usize,
    pub details: BTreeMap<ConditionKind, Truth>,
}

impl TransitionRisk {
    fn from_conditions(gap: Option<f64>, set: &ConditionSet) -> Self {
        let met = set.iter().filter(|c| c.truth.is_satisfied()).count();
        let total = set.iter().count();
        let probability = if met > 0 && met * 2 >= total {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        Self {
            gap,
            probability,
            conditions_met: met,
            conditions_total: total,
            details: set.iter().map(|c| (c.kind, c.truth)).collect(),
        }
    }
}

/// `max(0, a - b)` when `a` is known.
fn gap(value: Option<f64>, f: impl FnOnce(f64) -> f64) -> Option<f64> {
    value.filter(|v| v.is_finite()).map(|v| f(v).max(0.0))
}

/// Risks for a result in `stage`.
#[must_use]
pub fn transition_risks(
    stage: Stage,
    m: &StageMetricsSnapshot,
    t: &StageThresholds,
) -> BTreeMap<Stage, TransitionRisk> {
    let mut risks = BTreeMap::new();

    match stage {
        Stage::S1 => {
            let s0 = conditions::s0_conditions(m, t);
            risks.insert(
                Stage::S0,
                TransitionRisk::from_conditions(
                    gap(m.coverage_high, |high| high - t.coverage_critical),
                    &s0,
                ),
            );

            let s2 = conditions::s2_conditions(m, t).gates_only();
            risks.insert(
                Stage::S2,
                TransitionRisk::from_conditions(
                    gap(m.coverage_low, |low| t.coverage_healthy - low),
                    &s2,
                ),
            );
        }
        Stage::S2 => {
            let s3 = conditions::s3_conditions(m, t);
            risks.insert(
                Stage::S3,
                TransitionRisk::from_conditions(
                    gap(m.coverage_low, |low| t.coverage_sustainable - low),
                    &s3,
                ),
            );

            let back = conditions::s2_conditions(m, t).negated_gates();
            risks.insert(
                Stage::S1,
                TransitionRisk::from_conditions(
                    gap(m.coverage_low, |low| low - t.coverage_healthy),
                    &back,
                ),
            );
        }
        Stage::S0 | Stage::S3 => {}
    }

    risks
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn empty() -> StageMetricsSnapshot {
        StageMetricsSnapshot::empty(DateTime::from_timestamp(0, 0).unwrap_or_default())
    }

    #[test]
    fn s1_risks_cover_neighbours() {
        let t = StageThresholds::default();
        let m = empty()
            .with_coverage(0.5, 0.6)
            .with_qoq_deflation(0.2)
            .with_spot_discount(0.5);

        let risks = transition_risks(Stage::S1, &m, &t);
        assert_eq!(risks.keys().copied().collect::<Vec<_>>(), vec![Stage::S0, Stage::S2]);

        let to_s0 = &risks[&Stage::S0];
        assert_eq!(to_s0.conditions_met, 2);
        assert_eq!(to_s0.conditions_total, 3);
        assert_eq!(to_s0.probability, RiskLevel::Medium);
        let gap = to_s0.gap.unwrap_or_default();
        assert!((gap - 0.3).abs() < 1e-9);

        let to_s2 = &risks[&Stage::S2];
        assert_eq!(to_s2.conditions_total, 2);
        assert_eq!(to_s2.probability, RiskLevel::Low);
        let gap = to_s2.gap.unwrap_or_default();
        assert!((gap - 0.2).abs() < 1e-9);
    }

    #[test]
    fn gap_is_never_negative() {
        let t = StageThresholds::default();
        // high already below critical
        let m = empty().with_coverage(0.1, 0.2);
        let risks = transition_risks(Stage::S1, &m, &t);
        assert_eq!(risks[&Stage::S0].gap, Some(0.0));
    }

    #[test]
    fn unknown_bound_has_no_gap() {
        let risks = transition_risks(Stage::S1, &empty(), &StageThresholds::default());
        assert_eq!(risks[&Stage::S0].gap, None);
        assert_eq!(risks[&Stage::S0].conditions_met, 0);
        assert_eq!(risks[&Stage::S0].probability, RiskLevel::Low);
    }

    #[test]
    fn s2_risk_back_to_s1_is_low() {
        let t = StageThresholds::default();
        let m = empty().with_coverage(0.8, 0.95).with_rental_qoq(0.01);
        let risks = transition_risks(Stage::S2, &m, &t);

        assert_eq!(risks[&Stage::S1].probability, RiskLevel::Low);
        assert_eq!(risks[&Stage::S1].conditions_met, 0);
        assert_eq!(risks[&Stage::S3].conditions_total, 2);
    }

    #[test]
    fn terminal_stages_have_no_risks() {
        let t = StageThresholds::default();
        assert!(transition_risks(Stage::S0, &empty(), &t).is_empty());
        assert!(transition_risks(Stage::S3, &empty(), &t).is_empty());
    }
}
