//! # Property-Based Tests
//!
//! Determinism and totality invariants of the engine, checked with proptest.

use chrono::{DateTime, Utc};
use infrawatch_core::{
    Confidence, Engine, EngineConfig, IndexFamily, MetricsSnapshot, Observation, PriceKey, Stage,
    StageMetricsSnapshot, ValueRange, aggregate, canonical_checksum,
};
use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

prop_compose! {
    fn stage_snapshot()(
        secs in 1_600_000_000i64..1_900_000_000,
        low in option::of(0.0f64..2.0),
        high in option::of(0.0f64..2.0),
        deflation in option::of(-0.5f64..0.5),
        spot in option::of(0.0f64..1.0),
        rental in option::of(-0.2f64..0.2),
        streak in option::of(0u32..8),
        margin in option::of(-0.1f64..0.1),
        supply in option::of(0.0f64..1.0),
    ) -> StageMetricsSnapshot {
        StageMetricsSnapshot {
            captured_at: at(secs),
            coverage_low: low,
            coverage_high: high,
            qoq_deflation: deflation,
            spot_discount: spot,
            rental_qoq: rental,
            growth_streak: streak,
            margin_qoq: margin,
            supply_tightness: supply,
        }
    }
}

prop_compose! {
    fn metrics_snapshot(secs: i64)(
        prices in vec(0.5f64..200.0, 0..4),
        low in 0.0f64..1.5,
        width in 0.0f64..0.5,
        spot in option::of(0.0f64..0.8),
    ) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::new(at(secs));
        for (i, price) in prices.iter().enumerate() {
            snapshot = snapshot.with_price(PriceKey::new("provider", format!("sku-{i}"), "hourly"), *price);
        }
        if let Ok(range) = ValueRange::new(low, low + width) {
            snapshot = snapshot.with_coverage(range);
        }
        if let Some(spot) = spot {
            snapshot = snapshot.with_spot_discount(spot);
        }
        snapshot
    }
}

proptest! {
    /// Same snapshot, same verdict.
    #[test]
    fn classification_deterministic(snapshot in stage_snapshot()) {
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        prop_assert_eq!(engine.classify(&snapshot), engine.classify(&snapshot));
    }

    /// Trigger map only ever holds known conditions, and risks only S1/S2.
    #[test]
    fn classification_shape(snapshot in stage_snapshot()) {
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let result = engine.classify(&snapshot);

        prop_assert_eq!(result.evaluated_at, snapshot.captured_at);
        if matches!(result.stage, Stage::S0 | Stage::S3) {
            prop_assert!(result.transition_risks.is_empty());
        }
        for risk in result.transition_risks.values() {
            prop_assert!(risk.gap.is_none_or(|g| g >= 0.0));
            prop_assert!(risk.conditions_met <= risk.conditions_total);
        }
    }

    /// S1 is never LOW confidence.
    #[test]
    fn fallback_never_low(snapshot in stage_snapshot()) {
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let result = engine.classify(&snapshot);
        if result.stage == Stage::S1 {
            prop_assert_ne!(result.confidence, Confidence::Low);
        }
    }

    /// Detection is a pure function of the two snapshots.
    #[test]
    fn detection_deterministic(
        current in metrics_snapshot(1_700_604_800),
        previous in metrics_snapshot(1_700_000_000),
    ) {
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let a = engine.evaluate(&current, Some(&previous)).expect("a");
        let b = engine.evaluate(&current, Some(&previous)).expect("b");
        prop_assert_eq!(canonical_checksum(&a).expect("a"), canonical_checksum(&b).expect("b"));
        prop_assert_eq!(a, b);
    }

    /// A snapshot compared with itself emits nothing.
    #[test]
    fn no_change_no_signal(snapshot in metrics_snapshot(1_700_000_000)) {
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let signals = engine.detect_signals(&snapshot, &snapshot).expect("detect");
        prop_assert!(signals.is_empty());
    }

    /// The weighted mean stays within the range of mapped values.
    #[test]
    fn aggregate_within_bounds(h100 in 0.5f64..10.0, a100 in 0.5f64..10.0, noise in 0.0f64..1000.0) {
        let family = IndexFamily::new("gpu_hourly_index", &[("h100", 0.6), ("a100", 0.4)]);
        let observations = vec![
            Observation::new("h100", "aws", h100),
            Observation::new("a100", "aws", a100),
            Observation::new("tpu", "gcp", noise),
        ];
        let value = aggregate(&observations, &family).as_point().expect("value");
        prop_assert!(value >= h100.min(a100) - 1e-9);
        prop_assert!(value <= h100.max(a100) + 1e-9);
    }
}
