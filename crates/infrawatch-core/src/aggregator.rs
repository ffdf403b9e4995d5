//! # Aggregator Module
//!
//! Turns raw per-entity observations into normalized derived indicators.
//!
//! - Weighted indices over a static weight table ([`aggregate`])
//! - Coverage ranges from revenue and capex ([`coverage_ratio`])
//! - Small calculators: ratio, change rate, base-100 index, growth streak
//!
//! Every function is pure. Degenerate arithmetic (zero weight, non-positive
//! denominators) yields an absent result instead of an error or a zero.

use crate::config::{CoverageAssumptions, IndexFamily};
use crate::{DerivedMetric, Scope, ValueRange};
use serde::{Deserialize, Serialize};

/// Name given to coverage metrics.
pub const COVERAGE_METRIC: &str = "coverage_ratio";

/// One raw observation for an indicator family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Observation {
    pub entity: String,
    pub sub_key: String,
    pub value: f64,
}

impl Observation {
    #[must_use]
    pub fn new(entity: impl Into<String>, sub_key: impl Into<String>, value: f64) -> Self {
        Self {
            entity: entity.into(),
            sub_key: sub_key.into(),
            value,
        }
    }
}

// =============================================================================
// WEIGHTED INDEX
// =============================================================================

/// Weighted mean of `observations` under `family`'s weight table.
///
/// `Σ(value·weight) / Σ(weight)` over observations whose weight key is in the
/// table. Unmapped observations are excluded from both sums. If the total
/// weight is zero the value is absent.
#[must_use]
pub fn aggregate(observations: &[Observation], family: &IndexFamily) -> DerivedMetric {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    let mut contributors = 0usize;
    let mut unmapped = 0usize;
    let mut rejected = 0usize;

    for obs in observations {
        let Some(weight) = family.weight_for(&obs.entity, &obs.sub_key) else {
            unmapped += 1;
            continue;
        };
        if !obs.value.is_finite() {
            rejected += 1;
            continue;
        }
        weighted_sum += obs.value * weight;
        total_weight += weight;
        contributors += 1;
    }

    let scope = Scope::entity(family.name.clone());
    let metric = if total_weight > 0.0 {
        DerivedMetric::point(family.name.clone(), weighted_sum / total_weight, scope)
    } else {
        DerivedMetric::absent(family.name.clone(), scope)
    };

    metric
        .with_meta("method", "weighted_average")
        .with_meta("contributors", contributors)
        .with_meta("unmapped", unmapped)
        .with_meta("rejected", rejected)
        .with_meta("total_weight", total_weight)
}

// =============================================================================
// COVERAGE
// =============================================================================

/// Coverage range of revenue over assumed infrastructure depreciation.
///
/// With allocation band `[a_low, a_high]` and depreciation period `P`:
///
/// ```text
/// low  = revenue / (capex · a_high / P)
/// high = revenue / (capex · a_low  / P)
/// ```
///
/// The larger allocation produces the lower bound. Missing inputs, negative
/// revenue and `capex <= 0` all yield an absent metric.
#[must_use]
pub fn coverage_ratio(
    revenue: Option<f64>,
    capex: Option<f64>,
    assumptions: &CoverageAssumptions,
    scope: Scope,
) -> DerivedMetric {
    let absent = || {
        DerivedMetric::absent(COVERAGE_METRIC, scope.clone()).with_meta("method", "coverage")
    };

    let (Some(revenue), Some(capex)) = (finite(revenue), finite(capex)) else {
        return absent();
    };
    if revenue < 0.0 {
        return absent();
    }

    let periods = assumptions.depreciation_periods;
    let low = ratio(revenue, capex * assumptions.allocation_high / periods);
    let high = ratio(revenue, capex * assumptions.allocation_low / periods);

    match (low, high) {
        (Some(low), Some(high)) => match ValueRange::new(low, high) {
            Ok(range) => DerivedMetric::range(COVERAGE_METRIC, range, scope)
                .with_meta("method", "coverage")
                .with_meta("revenue", revenue)
                .with_meta("capex", capex),
            Err(_) => absent(),
        },
        _ => absent(),
    }
}

/// Mean of the per-entity coverage ranges that are present.
///
/// Absent inputs are skipped; if none are present the result is absent.
#[must_use]
pub fn aggregate_coverage(metrics: &[DerivedMetric], scope: Scope) -> DerivedMetric {
    let ranges: Vec<ValueRange> = metrics.iter().filter_map(DerivedMetric::as_range).collect();

    if ranges.is_empty() {
        return DerivedMetric::absent(COVERAGE_METRIC, scope).with_meta("contributors", 0);
    }

    let count = ranges.len() as f64;
    let low = ranges.iter().map(ValueRange::low).sum::<f64>() / count;
    let high = ranges.iter().map(ValueRange::high).sum::<f64>() / count;

    match ValueRange::new(low, high) {
        Ok(range) => DerivedMetric::range(COVERAGE_METRIC, range, scope)
            .with_meta("method", "mean_of_ranges")
            .with_meta("contributors", ranges.len()),
        Err(_) => DerivedMetric::absent(COVERAGE_METRIC, scope),
    }
}

// =============================================================================
// CALCULATORS
// =============================================================================

/// `numerator / denominator`, absent for a non-positive denominator.
#[must_use]
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if !numerator.is_finite() || !denominator.is_finite() || denominator <= 0.0 {
        return None;
    }
    Some(numerator / denominator)
}

/// Relative change `(current - previous) / previous` as a fraction.
///
/// Absent when `previous <= 0`.
#[must_use]
pub fn relative_change(current: f64, previous: f64) -> Option<f64> {
    if !current.is_finite() {
        return None;
    }
    ratio(current - previous, previous)
}

/// Relative change in percent.
#[must_use]
pub fn change_rate(current: f64, previous: f64) -> Option<f64> {
    relative_change(current, previous).map(|delta| delta * 100.0)
}

/// Base-100 index of `current` against `base`.
#[must_use]
pub fn index(current: f64, base: f64) -> Option<f64> {
    ratio(current, base).map(|r| r * 100.0)
}

/// Number of trailing consecutive period-over-period increases in `series`.
///
/// `[1, 3, 2, 4, 5]` has a streak of 2. A non-finite value ends the streak.
#[must_use]
pub fn growth_streak(series: &[f64]) -> u32 {
    series
        .windows(2)
        .rev()
        .take_while(|w| w[0].is_finite() && w[1].is_finite() && w[1] > w[0])
        .count() as u32
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn gpu_family() -> IndexFamily {
        IndexFamily::new("gpu_hourly_index", &[("h100", 0.6), ("a100", 0.4)])
    }

    #[test]
    fn weighted_mean() {
        let obs = vec![
            Observation::new("h100", "lambda_labs", 2.49),
            Observation::new("a100", "lambda_labs", 1.29),
        ];
        let metric = aggregate(&obs, &gpu_family());
        let value = metric.as_point().expect("value");
        assert!(approx(value, 2.49 * 0.6 + 1.29 * 0.4));
        assert_eq!(metric.metadata.get("contributors").map(String::as_str), Some("2"));
    }

    #[test]
    fn unmapped_observation_is_excluded() {
        let base = vec![
            Observation::new("h100", "aws", 3.0),
            Observation::new("a100", "aws", 2.0),
        ];
        let mut with_unmapped = base.clone();
        with_unmapped.push(Observation::new("mi300x", "azure", 100.0));

        let a = aggregate(&base, &gpu_family());
        let b = aggregate(&with_unmapped, &gpu_family());

        assert_eq!(a.value, b.value);
        assert_eq!(b.metadata.get("unmapped").map(String::as_str), Some("1"));
    }

    #[test]
    fn zero_total_weight_is_absent() {
        let obs = vec![Observation::new("tpu", "gcp", 1.0)];
        let metric = aggregate(&obs, &gpu_family());
        assert!(metric.is_absent());

        let zero = IndexFamily::new("zero", &[("h100", 0.0)]);
        let metric = aggregate(&[Observation::new("h100", "aws", 3.0)], &zero);
        assert!(metric.is_absent());
    }

    #[test]
    fn empty_observations_are_absent() {
        assert!(aggregate(&[], &gpu_family()).is_absent());
    }

    #[test]
    fn coverage_inverts_allocation_band() {
        let assumptions = CoverageAssumptions {
            allocation_low: 0.4,
            allocation_high: 0.6,
            depreciation_periods: 4.0,
        };
        let metric = coverage_ratio(Some(13.0), Some(90.0), &assumptions, Scope::entity("MSFT"));
        let range = metric.as_range().expect("range");

        // low uses the high allocation fraction
        assert!(approx(range.low(), 13.0 / (90.0 * 0.6 / 4.0)));
        assert!(approx(range.high(), 13.0 / (90.0 * 0.4 / 4.0)));
        assert!(range.low() <= range.high());
    }

    #[test]
    fn coverage_zero_capex_is_absent() {
        let assumptions = CoverageAssumptions::default();
        assert!(coverage_ratio(Some(10.0), Some(0.0), &assumptions, Scope::default()).is_absent());
        assert!(coverage_ratio(Some(10.0), Some(-5.0), &assumptions, Scope::default()).is_absent());
        assert!(coverage_ratio(None, Some(5.0), &assumptions, Scope::default()).is_absent());
        assert!(coverage_ratio(Some(-1.0), Some(5.0), &assumptions, Scope::default()).is_absent());
    }

    #[test]
    fn coverage_aggregate_skips_absent() {
        let a = DerivedMetric::range(
            COVERAGE_METRIC,
            ValueRange::new(0.2, 0.4).expect("range"),
            Scope::entity("A"),
        );
        let b = DerivedMetric::absent(COVERAGE_METRIC, Scope::entity("B"));
        let c = DerivedMetric::range(
            COVERAGE_METRIC,
            ValueRange::new(0.4, 0.6).expect("range"),
            Scope::entity("C"),
        );

        let total = aggregate_coverage(&[a, b, c], Scope::default());
        let range = total.as_range().expect("range");
        assert!(approx(range.low(), 0.3));
        assert!(approx(range.high(), 0.5));

        assert!(aggregate_coverage(&[], Scope::default()).is_absent());
    }

    #[test]
    fn calculators_guard_denominators() {
        assert_eq!(ratio(1.0, 0.0), None);
        assert_eq!(ratio(1.0, -2.0), None);
        assert_eq!(change_rate(95.0, 0.0), None);
        assert_eq!(index(2.0, 0.0), None);

        assert!(approx(change_rate(90.0, 100.0).expect("rate"), -10.0));
        assert!(approx(index(2.49, 3.0).expect("index"), 83.0));
    }

    #[test]
    fn growth_streak_counts_trailing_increases() {
        assert_eq!(growth_streak(&[]), 0);
        assert_eq!(growth_streak(&[1.0]), 0);
        assert_eq!(growth_streak(&[1.0, 3.0, 2.0, 4.0, 5.0]), 2);
        assert_eq!(growth_streak(&[5.0, 4.0]), 0);
        assert_eq!(growth_streak(&[1.0, 2.0, f64::NAN, 3.0, 4.0]), 1);
    }
}
