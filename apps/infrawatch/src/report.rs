//! # Report Records
//!
//! Flat, serializable views of engine results for `--json-mode` and text
//! output. Numbers are pre-formatted; an absent value renders as `—`.

use infrawatch_core::{
    CycleOutcome, DerivedMetric, MetricValue, Signal, StageMetricsSnapshot, StageResult,
    TransitionRisk,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder for an absent value.
pub const ABSENT: &str = "—";

/// Format an optional number, `—` when absent or non-finite.
#[must_use]
pub fn fmt_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.4}"),
        _ => ABSENT.to_string(),
    }
}

// =============================================================================
// STAGE
// =============================================================================

/// Transition risk as reported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskReport {
    pub gap: String,
    pub probability: String,
    pub conditions_met: usize,
    pub conditions_total: usize,
}

impl From<&TransitionRisk> for RiskReport {
    fn from(risk: &TransitionRisk) -> Self {
        Self {
            gap: fmt_value(risk.gap),
            probability: format!("{:?}", risk.probability).to_lowercase(),
            conditions_met: risk.conditions_met,
            conditions_total: risk.conditions_total,
        }
    }
}

/// Stage verdict as reported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageReport {
    pub stage: String,
    pub stage_name: String,
    pub confidence: String,
    pub rationale: String,
    pub trigger_conditions: BTreeMap<String, bool>,
    pub transition_risks: BTreeMap<String, RiskReport>,
    pub inputs: BTreeMap<String, String>,
    pub evaluated_at: String,
}

impl From<&StageResult> for StageReport {
    fn from(result: &StageResult) -> Self {
        Self {
            stage: format!("{:?}", result.stage),
            stage_name: result.stage.name().to_string(),
            confidence: result.confidence.as_str().to_string(),
            rationale: result.rationale.clone(),
            trigger_conditions: result
                .trigger_conditions
                .iter()
                .map(|(kind, value)| (kind.as_str().to_string(), *value))
                .collect(),
            transition_risks: result
                .transition_risks
                .iter()
                .map(|(stage, risk)| (format!("to_{stage:?}"), RiskReport::from(risk)))
                .collect(),
            inputs: input_table(&result.inputs),
            evaluated_at: result.evaluated_at.to_rfc3339(),
        }
    }
}

/// Classifier inputs, one row per metric.
#[must_use]
pub fn input_table(inputs: &StageMetricsSnapshot) -> BTreeMap<String, String> {
    [
        ("coverage_low", fmt_value(inputs.coverage_low)),
        ("coverage_high", fmt_value(inputs.coverage_high)),
        ("qoq_deflation", fmt_value(inputs.qoq_deflation)),
        ("spot_discount", fmt_value(inputs.spot_discount)),
        ("rental_qoq", fmt_value(inputs.rental_qoq)),
        (
            "growth_streak",
            inputs
                .growth_streak
                .map_or_else(|| ABSENT.to_string(), |n| n.to_string()),
        ),
        ("margin_qoq", fmt_value(inputs.margin_qoq)),
        ("supply_tightness", fmt_value(inputs.supply_tightness)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

// =============================================================================
// SIGNALS
// =============================================================================

/// Signal as reported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalReport {
    pub id: String,
    pub triggered_at: String,
    #[serde(rename = "type")]
    pub signal_type: String,
    pub severity: String,
    pub direction: String,
    pub metric: String,
    pub previous_value: String,
    pub current_value: String,
    pub change_percent: String,
    pub threshold: String,
    pub description: String,
}

impl From<&Signal> for SignalReport {
    fn from(signal: &Signal) -> Self {
        Self {
            id: signal.id.to_string(),
            triggered_at: signal.triggered_at.to_rfc3339(),
            signal_type: signal.signal_type.as_str().to_string(),
            severity: signal.severity.as_str().to_string(),
            direction: signal.direction.as_str().to_string(),
            metric: signal.metric.clone(),
            previous_value: fmt_value(Some(signal.previous_value)),
            current_value: fmt_value(Some(signal.current_value)),
            change_percent: signal
                .change_percent
                .map_or_else(|| ABSENT.to_string(), |p| format!("{p:+.1}%")),
            threshold: fmt_value(signal.threshold),
            description: signal.description.clone(),
        }
    }
}

// =============================================================================
// METRICS
// =============================================================================

/// Derived metric as reported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricReport {
    pub name: String,
    pub value: String,
    pub low: String,
    pub high: String,
    pub entity: String,
    pub period: String,
    pub metadata: BTreeMap<String, String>,
}

impl From<&DerivedMetric> for MetricReport {
    fn from(metric: &DerivedMetric) -> Self {
        let (value, low, high) = match metric.value {
            Some(MetricValue::Point(v)) => (Some(v), None, None),
            Some(MetricValue::Range(r)) => (Some(r.midpoint()), Some(r.low()), Some(r.high())),
            None => (None, None, None),
        };
        Self {
            name: metric.name.clone(),
            value: fmt_value(value),
            low: fmt_value(low),
            high: fmt_value(high),
            entity: metric
                .scope
                .entity
                .clone()
                .unwrap_or_else(|| ABSENT.to_string()),
            period: metric
                .scope
                .period
                .clone()
                .unwrap_or_else(|| ABSENT.to_string()),
            metadata: metric.metadata.clone(),
        }
    }
}

// =============================================================================
// CYCLES
// =============================================================================

/// One evaluation cycle as reported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleReport {
    pub captured_at: String,
    pub compared_with: String,
    pub stage: StageReport,
    pub signals: Vec<SignalReport>,
    /// Crossings dropped by the dedup ledger.
    pub suppressed: usize,
    /// Hex rotate-xor checksum of the canonical outcome.
    pub checksum: String,
    /// BLAKE3 of the canonical outcome.
    pub blake3: String,
}

impl CycleReport {
    /// Build from an outcome. `signals` may differ from `outcome.signals`
    /// after dedup; the fingerprints always cover the raw outcome.
    #[must_use]
    pub fn new(
        outcome: &CycleOutcome,
        signals: &[Signal],
        suppressed: usize,
        checksum: u64,
        blake3: String,
    ) -> Self {
        Self {
            captured_at: outcome.captured_at.to_rfc3339(),
            compared_with: outcome
                .compared_with
                .map_or_else(|| ABSENT.to_string(), |t| t.to_rfc3339()),
            stage: StageReport::from(&outcome.stage),
            signals: signals.iter().map(SignalReport::from).collect(),
            suppressed,
            checksum: format!("{checksum:016x}"),
            blake3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_renders_as_dash() {
        assert_eq!(fmt_value(None), "—");
        assert_eq!(fmt_value(Some(f64::NAN)), "—");
        assert_eq!(fmt_value(Some(0.25)), "0.2500");
    }
}
