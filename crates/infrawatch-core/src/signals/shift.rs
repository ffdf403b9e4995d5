//! Supply/demand shifts and adoption inflections.

use super::SignalDraft;
use crate::aggregator::relative_change;
use crate::config::SignalThresholds;
use crate::{Direction, Severity, Signal, SignalType};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Metric label of the spot discount.
const SPOT_DISCOUNT_METRIC: &str = "spot_discount";

/// Spot discount moved by at least `supply_shift_min_change` (absolute).
///
/// `Up` when the discount widens. `change_percent` is the move in
/// percentage points.
#[must_use]
pub fn supply_demand_shift(
    current: f64,
    previous: f64,
    t: &SignalThresholds,
    at: DateTime<Utc>,
) -> Option<Signal> {
    if !current.is_finite() || !previous.is_finite() {
        return None;
    }
    let change = current - previous;
    if change.abs() < t.supply_shift_min_change {
        return None;
    }

    let direction = Direction::of_change(change);
    let verb = match direction {
        Direction::Up => "widened",
        Direction::Down => "narrowed",
    };

    Some(
        SignalDraft {
            signal_type: SignalType::SupplyDemandShift,
            severity: Severity::Medium,
            direction,
            metric: SPOT_DISCOUNT_METRIC.to_string(),
            id_suffix: None,
            previous_value: previous,
            current_value: current,
            change_percent: Some(change * 100.0),
            threshold: None,
            description: format!(
                "Spot discount {verb} from {:.1}% to {:.1}%",
                previous * 100.0,
                current * 100.0
            ),
        }
        .emit(at),
    )
}

/// Adoption metrics whose relative change reaches
/// `adoption_inflection_min_change`.
#[must_use]
pub fn adoption_inflections(
    current: &BTreeMap<String, f64>,
    previous: &BTreeMap<String, f64>,
    t: &SignalThresholds,
    at: DateTime<Utc>,
) -> Vec<Signal> {
    current
        .iter()
        .filter_map(|(name, &cur)| {
            let prev = *previous.get(name)?;
            let delta = relative_change(cur, prev)?;
            if delta.abs() < t.adoption_inflection_min_change {
                return None;
            }

            let direction = Direction::of_change(delta);
            Some(
                SignalDraft {
                    signal_type: SignalType::AdoptionInflection,
                    severity: Severity::Medium,
                    direction,
                    metric: name.clone(),
                    id_suffix: None,
                    previous_value: prev,
                    current_value: cur,
                    change_percent: Some(delta * 100.0),
                    threshold: None,
                    description: format!(
                        "{name} {} {:+.1}% period over period",
                        match direction {
                            Direction::Up => "accelerated",
                            Direction::Down => "slowed",
                        },
                        delta * 100.0
                    ),
                }
                .emit(at),
            )
        })
        .collect()
}
