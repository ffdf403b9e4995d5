//! Price move detection.

use super::SignalDraft;
use crate::aggregator::relative_change;
use crate::config::SignalThresholds;
use crate::snapshot::PriceKey;
use crate::{Direction, Severity, Signal, SignalType};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Slack for binary rounding at a band edge; 1.0 -> 0.9 is a 10% move.
const BAND_EDGE_TOLERANCE: f64 = 1e-9;

fn reaches(magnitude: f64, band: f64) -> bool {
    magnitude + BAND_EDGE_TOLERANCE >= band
}

/// One signal per price series whose relative change reaches a band.
///
/// Series missing from either side, or with a non-positive previous price,
/// are skipped.
#[must_use]
pub fn price_moves(
    current: &BTreeMap<PriceKey, f64>,
    previous: &BTreeMap<PriceKey, f64>,
    t: &SignalThresholds,
    at: DateTime<Utc>,
) -> Vec<Signal> {
    current
        .iter()
        .filter_map(|(key, &cur)| {
            let prev = *previous.get(key)?;
            let delta = relative_change(cur, prev)?;

            let severity = if reaches(delta.abs(), t.price_move_high) {
                Severity::High
            } else if reaches(delta.abs(), t.price_move_medium) {
                Severity::Medium
            } else {
                return None;
            };
            let direction = Direction::of_change(delta);

            Some(
                SignalDraft {
                    signal_type: SignalType::PriceMove,
                    severity,
                    direction,
                    metric: key.label(),
                    id_suffix: None,
                    previous_value: prev,
                    current_value: cur,
                    change_percent: Some(delta * 100.0),
                    threshold: None,
                    description: format!(
                        "{} {} {} price {} {:+.1}% ({} -> {})",
                        key.entity,
                        key.instrument,
                        key.price_type,
                        match direction {
                            Direction::Up => "rose",
                            Direction::Down => "fell",
                        },
                        delta * 100.0,
                        prev,
                        cur
                    ),
                }
                .emit(at),
            )
        })
        .collect()
}
