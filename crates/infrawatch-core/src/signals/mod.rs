//! # Signal Detection
//!
//! Compares a current snapshot with its comparison snapshot and emits
//! discrete events for significant movements.
//!
//! | Pass | Metric | Severity |
//! |------|--------|----------|
//! | price move | every price series in both snapshots | `|Δ| >= high` → high, `>= medium` → medium |
//! | threshold crossing | coverage range vs each boundary | high |
//! | supply/demand shift | spot discount, absolute change | medium |
//! | adoption inflection | each adoption metric, relative change | medium |
//!
//! The detector is stateless. It will report the same crossing every cycle
//! the condition holds between the two snapshots it is given; suppressing
//! repeats is the caller's job.
//!
//! Output order is fixed: passes in the order above, each pass in key order.

mod crossing;
mod price;
mod shift;

pub use crossing::threshold_crossings;
pub use price::price_moves;
pub use shift::{adoption_inflections, supply_demand_shift};

use crate::config::SignalThresholds;
use crate::snapshot::MetricsSnapshot;
use crate::{Direction, InfraWatchError, Severity, Signal, SignalId, SignalType};
use chrono::{DateTime, Utc};

/// Fields of a signal before it is stamped with an id and instant.
#[derive(Debug, Clone)]
struct SignalDraft {
    signal_type: SignalType,
    severity: Severity,
    direction: Direction,
    /// Metric label; also the id key.
    metric: String,
    /// Extra id component distinguishing signals on the same metric.
    id_suffix: Option<String>,
    previous_value: f64,
    current_value: f64,
    change_percent: Option<f64>,
    threshold: Option<f64>,
    description: String,
}

impl SignalDraft {
    fn emit(self, triggered_at: DateTime<Utc>) -> Signal {
        let id_key = match &self.id_suffix {
            Some(suffix) => format!("{}@{}", self.metric, suffix),
            None => self.metric.clone(),
        };
        Signal {
            id: SignalId::new(self.signal_type, &id_key, self.direction, triggered_at),
            triggered_at,
            signal_type: self.signal_type,
            severity: self.severity,
            direction: self.direction,
            metric: self.metric,
            previous_value: self.previous_value,
            current_value: self.current_value,
            change_percent: self.change_percent,
            threshold: self.threshold,
            description: self.description,
            acknowledged_at: None,
            resolved_at: None,
        }
    }
}

// =============================================================================
// SIGNAL DETECTOR
// =============================================================================

/// Signal Detector - pure function of (current, previous, thresholds).
#[derive(Debug, Clone, Default)]
pub struct SignalDetector {
    thresholds: SignalThresholds,
}

impl SignalDetector {
    /// Create a detector over validated thresholds.
    #[must_use]
    pub fn new(thresholds: SignalThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub fn thresholds(&self) -> &SignalThresholds {
        &self.thresholds
    }

    /// Run every detection pass.
    ///
    /// Both snapshots are validated first; a malformed snapshot fails the
    /// whole call. Values missing from either side are skipped silently.
    /// Every signal is stamped with `current.captured_at`.
    pub fn detect(
        &self,
        current: &MetricsSnapshot,
        previous: &MetricsSnapshot,
    ) -> Result<Vec<Signal>, InfraWatchError> {
        current.validate()?;
        previous.validate()?;

        let at = current.captured_at;
        let t = &self.thresholds;
        let mut signals = Vec::new();

        signals.extend(price_moves(&current.price_index()?, &previous.price_index()?, t, at));

        if let (Some(cur), Some(prev)) = (current.coverage, previous.coverage) {
            signals.extend(threshold_crossings(cur, prev, t, at));
        }

        if let (Some(cur), Some(prev)) = (current.spot_discount, previous.spot_discount) {
            signals.extend(supply_demand_shift(cur, prev, t, at));
        }

        signals.extend(adoption_inflections(&current.adoption, &previous.adoption, t, at));

        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValueRange;
    use crate::snapshot::PriceKey;

    fn day(d: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600 + d * 86_400, 0).unwrap_or_default()
    }

    #[test]
    fn empty_snapshots_emit_nothing() {
        let detector = SignalDetector::default();
        let signals = detector
            .detect(&MetricsSnapshot::new(day(7)), &MetricsSnapshot::new(day(0)))
            .expect("detect");
        assert!(signals.is_empty());
    }

    #[test]
    fn malformed_snapshot_is_fatal() {
        let key = PriceKey::new("openai", "gpt-4o", "input");
        let bad = MetricsSnapshot::new(day(7))
            .with_price(key.clone(), 2.5)
            .with_price(key, 2.0);
        let result = SignalDetector::default().detect(&bad, &MetricsSnapshot::new(day(0)));
        assert!(matches!(result, Err(InfraWatchError::ShapeMismatch(_))));
    }

    #[test]
    fn passes_run_in_fixed_order() {
        let key = PriceKey::new("aws", "h100", "hourly");
        let previous = MetricsSnapshot::new(day(0))
            .with_price(key.clone(), 100.0)
            .with_coverage(ValueRange::new(0.28, 0.40).expect("range"))
            .with_spot_discount(0.20)
            .with_adoption("enterprise_share", 0.10);
        let current = MetricsSnapshot::new(day(7))
            .with_price(key, 80.0)
            .with_coverage(ValueRange::new(0.31, 0.45).expect("range"))
            .with_spot_discount(0.35)
            .with_adoption("enterprise_share", 0.15);

        let signals = SignalDetector::default()
            .detect(&current, &previous)
            .expect("detect");
        let types: Vec<SignalType> = signals.iter().map(|s| s.signal_type).collect();
        assert_eq!(
            types,
            vec![
                SignalType::PriceMove,
                SignalType::ThresholdCrossing,
                SignalType::SupplyDemandShift,
                SignalType::AdoptionInflection,
            ]
        );
        assert!(signals.iter().all(|s| s.triggered_at == day(7)));
        assert!(signals.iter().all(|s| s.acknowledged_at.is_none() && s.resolved_at.is_none()));
    }
}
