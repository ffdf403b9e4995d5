//! Coverage threshold crossings.

use super::SignalDraft;
use crate::aggregator::{COVERAGE_METRIC, relative_change};
use crate::config::{CrossingBasis, SignalThresholds};
use crate::{Direction, Severity, Signal, SignalType, ValueRange};
use chrono::{DateTime, Utc};

/// One high-severity signal per boundary crossed between `previous` and
/// `current`.
///
/// Upward: `previous.low < b <= current.low`. Downward depends on
/// [`CrossingBasis`]: the lower bound by default, the upper bound under
/// `Envelope`.
#[must_use]
pub fn threshold_crossings(
    current: ValueRange,
    previous: ValueRange,
    t: &SignalThresholds,
    at: DateTime<Utc>,
) -> Vec<Signal> {
    let mut signals = Vec::new();

    for &boundary in &t.coverage_boundaries {
        if previous.low() < boundary && boundary <= current.low() {
            signals.push(crossing(boundary, Direction::Up, previous.low(), current.low(), at));
            continue;
        }

        let (prev, cur) = match t.crossing_basis {
            CrossingBasis::LowerBound => (previous.low(), current.low()),
            CrossingBasis::Envelope => (previous.high(), current.high()),
        };
        if prev >= boundary && boundary > cur {
            signals.push(crossing(boundary, Direction::Down, prev, cur, at));
        }
    }

    signals
}

fn crossing(
    boundary: f64,
    direction: Direction,
    previous: f64,
    current: f64,
    at: DateTime<Utc>,
) -> Signal {
    let verb = match direction {
        Direction::Up => "rose above",
        Direction::Down => "fell below",
    };
    SignalDraft {
        signal_type: SignalType::ThresholdCrossing,
        severity: Severity::High,
        direction,
        metric: COVERAGE_METRIC.to_string(),
        id_suffix: Some(boundary.to_string()),
        previous_value: previous,
        current_value: current,
        change_percent: relative_change(current, previous).map(|d| d * 100.0),
        threshold: Some(boundary),
        description: format!("Coverage ratio {verb} {boundary} ({previous:.2} -> {current:.2})"),
    }
    .emit(at)
}
