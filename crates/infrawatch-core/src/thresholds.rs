//! # Default Thresholds
//!
//! Reference values compiled into the engine. They seed
//! [`EngineConfig::default`](crate::config::EngineConfig) and are never
//! consulted directly by the rules: every evaluation reads thresholds from the
//! injected config so alternative threshold sets can be tested and hot-swapped.
//!
//! ## Stage Rules
//!
//! | Constant | Value | Used as |
//! |----------|-------|---------|
//! | `COVERAGE_CRITICAL` | 0.3 | S0: `coverage_high < x`; S1 band floor |
//! | `COVERAGE_HEALTHY` | 0.7 | S2: `coverage_low > x`; S1 band ceiling |
//! | `COVERAGE_SUSTAINABLE` | 1.0 | S3: `coverage_low >= x` |
//! | `DEFLATION_SEVERE` | 0.15 | S0: `qoq_deflation > x` |
//! | `SPOT_DISCOUNT_EXCESS` | 0.40 | S0: `spot_discount > x` |
//! | `RENTAL_STABLE_BAND` | 0.05 | S2: `abs(rental_qoq) < x` |
//! | `MARGIN_STABLE_BAND` | 0.03 | S3 support: `abs(margin_qoq) < x` |
//! | `SUPPLY_TIGHT` | 0.80 | S2 support: `supply_tightness < x` |
//! | `GROWTH_MIN_STREAK` | 2 | S1: `growth_streak >= x` |

/// Coverage upper bound below which revenue cannot cover depreciation.
pub const COVERAGE_CRITICAL: f64 = 0.3;

/// Coverage lower bound above which the domain is early self-funding.
pub const COVERAGE_HEALTHY: f64 = 0.7;

/// Coverage lower bound at which the domain is fully self-sustaining.
pub const COVERAGE_SUSTAINABLE: f64 = 1.0;

/// Quarter-over-quarter price deflation considered a collapse.
pub const DEFLATION_SEVERE: f64 = 0.15;

/// Spot-vs-contract discount indicating excess capacity.
pub const SPOT_DISCOUNT_EXCESS: f64 = 0.40;

/// Half-width of the rental-price stability band.
pub const RENTAL_STABLE_BAND: f64 = 0.05;

/// Half-width of the margin stability band (percentage points as a fraction).
pub const MARGIN_STABLE_BAND: f64 = 0.03;

/// Supply tightness index at or above which supply is considered tight.
pub const SUPPLY_TIGHT: f64 = 0.80;

/// Consecutive positive growth periods required for the adoption condition.
pub const GROWTH_MIN_STREAK: u32 = 2;

/// Number of S0 sub-conditions that must hold.
///
/// Equal to the number of S0 conditions, so S0 requires all of them.
pub const S0_MIN_CONDITIONS: usize = 3;

// =============================================================================
// SIGNAL RULES
// =============================================================================

/// Absolute relative price change for a high-severity price move.
pub const PRICE_MOVE_HIGH: f64 = 0.10;

/// Absolute relative price change for a medium-severity price move.
pub const PRICE_MOVE_MEDIUM: f64 = 0.05;

/// Ordered coverage boundaries watched for crossings.
pub const COVERAGE_BOUNDARIES: [f64; 3] =
    [COVERAGE_CRITICAL, COVERAGE_HEALTHY, COVERAGE_SUSTAINABLE];

/// Spot discount change (absolute, fraction) for a supply/demand shift.
pub const SUPPLY_SHIFT_MIN_CHANGE: f64 = 0.10;

/// Absolute relative change of an adoption metric for an inflection.
pub const ADOPTION_INFLECTION_MIN_CHANGE: f64 = 0.20;

/// Days between the current snapshot and its comparison snapshot.
pub const COMPARISON_LOOKBACK_DAYS: i64 = 7;

/// Longest accepted comparison lookback (ten years).
pub const MAX_LOOKBACK_DAYS: i64 = 3650;

// =============================================================================
// COVERAGE ASSUMPTIONS
// =============================================================================

/// Lower bound of the share of capex assumed to be AI infrastructure.
pub const CAPEX_ALLOCATION_LOW: f64 = 0.4;

/// Upper bound of the share of capex assumed to be AI infrastructure.
pub const CAPEX_ALLOCATION_HIGH: f64 = 0.6;

/// Straight-line depreciation period (years) for infrastructure capex.
pub const DEPRECIATION_PERIODS: f64 = 4.0;
