//! Crossing dedup across cycles.
//!
//! The detector reports a crossing every cycle its two snapshots straddle a
//! boundary. With overlapping comparison windows the same move shows up more
//! than once. The ledger remembers the last direction flagged per
//! (metric, boundary) and drops repeats until the opposite crossing arrives.

use infrawatch_core::{Direction, Signal, SignalType};
use std::collections::BTreeMap;

/// Last crossing direction per (metric, boundary).
#[derive(Debug, Default, Clone)]
pub struct CrossingLedger {
    last: BTreeMap<(String, u64), Direction>,
}

impl CrossingLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `signal` should be surfaced. Records it if so.
    ///
    /// Only threshold crossings are tracked; everything else passes.
    pub fn admit(&mut self, signal: &Signal) -> bool {
        if signal.signal_type != SignalType::ThresholdCrossing {
            return true;
        }
        let Some(boundary) = signal.threshold else {
            return true;
        };

        let key = (signal.metric.clone(), boundary.to_bits());
        if self.last.get(&key) == Some(&signal.direction) {
            return false;
        }
        self.last.insert(key, signal.direction);
        true
    }

    /// Keep admitted signals; returns them with the number suppressed.
    pub fn filter(&mut self, signals: Vec<Signal>) -> (Vec<Signal>, usize) {
        let before = signals.len();
        let kept: Vec<Signal> = signals.into_iter().filter(|s| self.admit(s)).collect();
        let suppressed = before - kept.len();
        (kept, suppressed)
    }

    /// Direction last flagged for `metric` at `boundary`.
    #[must_use]
    pub fn last_direction(&self, metric: &str, boundary: f64) -> Option<Direction> {
        self.last.get(&(metric.to_string(), boundary.to_bits())).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use infrawatch_core::{Severity, SignalId};

    fn crossing(direction: Direction, boundary: f64, at: i64) -> Signal {
        let at = DateTime::from_timestamp(at, 0).unwrap_or_default();
        Signal {
            id: SignalId::new(SignalType::ThresholdCrossing, "coverage_ratio", direction, at),
            triggered_at: at,
            signal_type: SignalType::ThresholdCrossing,
            severity: Severity::High,
            direction,
            metric: "coverage_ratio".to_string(),
            previous_value: 0.29,
            current_value: 0.31,
            change_percent: None,
            threshold: Some(boundary),
            description: String::new(),
            acknowledged_at: None,
            resolved_at: None,
        }
    }

    #[test]
    fn repeat_crossing_suppressed() {
        let mut ledger = CrossingLedger::new();
        assert!(ledger.admit(&crossing(Direction::Up, 0.3, 0)));
        assert!(!ledger.admit(&crossing(Direction::Up, 0.3, 86_400)));
        assert_eq!(ledger.last_direction("coverage_ratio", 0.3), Some(Direction::Up));
    }

    #[test]
    fn reverse_crossing_resets() {
        let mut ledger = CrossingLedger::new();
        assert!(ledger.admit(&crossing(Direction::Up, 0.3, 0)));
        assert!(ledger.admit(&crossing(Direction::Down, 0.3, 1)));
        assert!(ledger.admit(&crossing(Direction::Up, 0.3, 2)));
    }

    #[test]
    fn boundaries_tracked_separately() {
        let mut ledger = CrossingLedger::new();
        let (kept, suppressed) = ledger.filter(vec![
            crossing(Direction::Up, 0.3, 0),
            crossing(Direction::Up, 0.7, 0),
            crossing(Direction::Up, 0.3, 1),
        ]);
        assert_eq!(kept.len(), 2);
        assert_eq!(suppressed, 1);
    }
}
