//! # Stage Classification
//!
//! Maps one [`StageMetricsSnapshot`] to exactly one lifecycle stage.
//!
//! ## Stage Definitions
//!
//! | Stage | Name | Rule |
//! |-------|------|------|
//! | S0 | Unsustainable | at least `s0_min_conditions` of: high coverage `<` critical, deflation `>` severe, spot discount `>` excess |
//! | S3 | Mature Industrialization | low coverage `>=` sustainable |
//! | S2 | Early Self-Funding | low coverage `>` healthy AND `|rental_qoq| <` band |
//! | S1 | Critical Transition | fallback |
//!
//! Rules are checked in the order S0, S3, S2, S1 and the first that holds
//! wins. Nothing is carried between cycles: every verdict is re-derived from
//! the snapshot alone.
//!
//! ## Confidence
//!
//! | Stage | HIGH | MEDIUM | LOW |
//! |-------|------|--------|-----|
//! | S0 | every S0 condition true | fewer than all, at least the minimum | - |
//! | S3 | margin stable | margin unknown | margin unstable |
//! | S2 | supply stable | supply unknown | supply tight |
//! | S1 | growth streak met | otherwise | - |

mod conditions;
mod risk;

pub use conditions::{
    Condition, ConditionKind, ConditionRole, ConditionSet, s0_conditions, s1_conditions,
    s2_conditions, s3_conditions,
};
pub use risk::{RiskLevel, TransitionRisk, transition_risks};

use crate::Truth;
use crate::config::StageThresholds;
use crate::snapshot::StageMetricsSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// STAGE ENUM
// =============================================================================

/// Lifecycle stage of the monitored domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// S0: Unsustainable
    S0,
    /// S1: Critical Transition
    S1,
    /// S2: Early Self-Funding
    S2,
    /// S3: Mature Industrialization
    S3,
}

impl Stage {
    /// All stages in ascending order.
    pub const ALL: [Stage; 4] = [Stage::S0, Stage::S1, Stage::S2, Stage::S3];

    /// Get the stage name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Stage::S0 => "Unsustainable",
            Stage::S1 => "Critical Transition",
            Stage::S2 => "Early Self-Funding",
            Stage::S3 => "Mature Industrialization",
        }
    }

    /// Get a description of the stage.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Stage::S0 => {
                "Severe infrastructure overbuild: revenue cannot cover depreciation and prices are collapsing"
            }
            Stage::S1 => "Revenue growing fast but still insufficient; supply and demand tightly balanced",
            Stage::S2 => "Coverage approaching self-funding, stable prices, accelerating adoption",
            Stage::S3 => "Fully self-funding; prices falling while margins hold",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self, self.name())
    }
}

/// Confidence in a stage verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    fn from_support(truth: Truth) -> Self {
        match truth {
            Truth::True => Confidence::High,
            Truth::Unknown => Confidence::Medium,
            Truth::False => Confidence::Low,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "LOW",
            Confidence::Medium => "MEDIUM",
            Confidence::High => "HIGH",
        }
    }
}

// =============================================================================
// STAGE RESULT
// =============================================================================

/// Verdict of one classification cycle. Superseded, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: Stage,
    pub confidence: Confidence,
    pub rationale: String,
    /// Known conditions of the winning stage.
    pub trigger_conditions: BTreeMap<ConditionKind, bool>,
    pub transition_risks: BTreeMap<Stage, TransitionRisk>,
    /// The snapshot the verdict was derived from.
    pub inputs: StageMetricsSnapshot,
    /// Capture instant of `inputs`.
    pub evaluated_at: DateTime<Utc>,
}

// =============================================================================
// STAGE CLASSIFIER
// =============================================================================

/// Stage Classifier - pure function of (snapshot, thresholds).
#[derive(Debug, Clone, Default)]
pub struct StageClassifier {
    thresholds: StageThresholds,
}

impl StageClassifier {
    /// Create a classifier over validated thresholds.
    #[must_use]
    pub fn new(thresholds: StageThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub fn thresholds(&self) -> &StageThresholds {
        &self.thresholds
    }

    /// Classify a snapshot. Total: every snapshot yields a result.
    #[must_use]
    pub fn determine(&self, snapshot: &StageMetricsSnapshot) -> StageResult {
        let t = &self.thresholds;

        let s0 = s0_conditions(snapshot, t);
        let s3 = s3_conditions(snapshot, t);
        let s2 = s2_conditions(snapshot, t);
        let s1 = s1_conditions(snapshot, t);

        let (stage, confidence, rationale, trigger) = if s0.gates_satisfied() >= t.s0_min_conditions
        {
            let met = s0.gates_satisfied();
            let confidence = if s0.all_gates_satisfied() {
                Confidence::High
            } else {
                Confidence::Medium
            };
            let rationale = format!(
                "Coverage below critical, price collapse and excess capacity ({met}/{} conditions)",
                s0.gate_count()
            );
            (Stage::S0, confidence, rationale, &s0)
        } else if s3.all_gates_satisfied() {
            let support = s3.truth(ConditionKind::MarginStable);
            let rationale = format!(
                "Coverage at or above {} with {}",
                t.coverage_sustainable,
                match support {
                    Truth::True => "stable cloud margins",
                    Truth::False => "unstable cloud margins",
                    Truth::Unknown => "margin data unavailable",
                }
            );
            (Stage::S3, Confidence::from_support(support), rationale, &s3)
        } else if s2.all_gates_satisfied() {
            let support = s2.truth(ConditionKind::SupplyStable);
            let rationale = format!(
                "Coverage above {} with stable rental prices; {}",
                t.coverage_healthy,
                match support {
                    Truth::True => "supply balanced",
                    Truth::False => "supply tight",
                    Truth::Unknown => "supply data unavailable",
                }
            );
            (Stage::S2, Confidence::from_support(support), rationale, &s2)
        } else {
            let confidence = if s1.truth(ConditionKind::AdoptionGrowing).is_satisfied() {
                Confidence::High
            } else {
                Confidence::Medium
            };
            (Stage::S1, confidence, s1_rationale(&s1), &s1)
        };

        let transition_risks = transition_risks(stage, snapshot, t);

        StageResult {
            stage,
            confidence,
            rationale,
            trigger_conditions: trigger.known(),
            transition_risks,
            inputs: snapshot.clone(),
            evaluated_at: snapshot.captured_at,
        }
    }
}

fn s1_rationale(s1: &ConditionSet) -> String {
    let band = s1.truth(ConditionKind::CoverageTransition).is_satisfied();
    let growth = s1.truth(ConditionKind::AdoptionGrowing).is_satisfied();

    match (band, growth) {
        (true, true) => "Coverage in transition band with sustained adoption growth".to_string(),
        (true, false) => "Coverage in transition band".to_string(),
        (false, true) => "Sustained adoption growth".to_string(),
        (false, false) if s1.known().is_empty() => {
            "Insufficient data; defaulting to transition".to_string()
        }
        (false, false) => "Mixed signals; defaulting to transition".to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }

    fn classify(snapshot: &StageMetricsSnapshot) -> StageResult {
        StageClassifier::default().determine(snapshot)
    }

    #[test]
    fn stage_ordering() {
        assert!(Stage::S0 < Stage::S1);
        assert!(Stage::S1 < Stage::S2);
        assert!(Stage::S2 < Stage::S3);
    }

    #[test]
    fn display_includes_name() {
        assert_eq!(Stage::S2.to_string(), "S2: Early Self-Funding");
    }

    #[test]
    fn empty_snapshot_is_s1_medium() {
        let result = classify(&StageMetricsSnapshot::empty(at()));
        assert_eq!(result.stage, Stage::S1);
        assert_eq!(result.confidence, Confidence::Medium);
        assert!(result.trigger_conditions.is_empty());
        assert_eq!(result.evaluated_at, at());
    }

    #[test]
    fn full_collapse_is_s0_high() {
        let snapshot = StageMetricsSnapshot::empty(at())
            .with_coverage(0.1, 0.2)
            .with_qoq_deflation(0.2)
            .with_spot_discount(0.5);
        let result = classify(&snapshot);
        assert_eq!(result.stage, Stage::S0);
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.trigger_conditions.len(), 3);
        assert!(result.transition_risks.is_empty());
    }

    #[test]
    fn two_of_three_is_not_s0_by_default() {
        let snapshot = StageMetricsSnapshot::empty(at())
            .with_coverage(0.1, 0.2)
            .with_qoq_deflation(0.2);
        assert_eq!(classify(&snapshot).stage, Stage::S1);
    }

    #[test]
    fn relaxed_minimum_gives_medium_s0() {
        let thresholds = StageThresholds {
            s0_min_conditions: 2,
            ..StageThresholds::default()
        };
        let snapshot = StageMetricsSnapshot::empty(at())
            .with_coverage(0.1, 0.2)
            .with_qoq_deflation(0.2);
        let result = StageClassifier::new(thresholds).determine(&snapshot);
        assert_eq!(result.stage, Stage::S0);
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn s3_confidence_follows_margin() {
        let base = StageMetricsSnapshot::empty(at()).with_coverage(1.1, 1.4);

        assert_eq!(classify(&base).confidence, Confidence::Medium);
        assert_eq!(
            classify(&base.clone().with_margin_qoq(0.01)).confidence,
            Confidence::High
        );
        assert_eq!(
            classify(&base.with_margin_qoq(0.05)).confidence,
            Confidence::Low
        );
    }

    #[test]
    fn s2_needs_rental_stability() {
        let base = StageMetricsSnapshot::empty(at()).with_coverage(0.8, 0.95);
        assert_eq!(classify(&base).stage, Stage::S1);

        let stable = base.with_rental_qoq(0.02).with_supply_tightness(0.6);
        let result = classify(&stable);
        assert_eq!(result.stage, Stage::S2);
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.transition_risks.contains_key(&Stage::S3));
        assert!(result.transition_risks.contains_key(&Stage::S1));
    }

    #[test]
    fn s1_rationale_names_conditions() {
        let snapshot = StageMetricsSnapshot::empty(at())
            .with_coverage(0.4, 0.5)
            .with_growth_streak(3);
        let result = classify(&snapshot);
        assert_eq!(result.stage, Stage::S1);
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.rationale.contains("transition band"));
        assert_eq!(
            result.trigger_conditions.get(&ConditionKind::CoverageTransition),
            Some(&true)
        );
    }
}
