//! # Replay Module
//!
//! Re-evaluates a snapshot history and fingerprints every cycle.
//!
//! Outcomes carry no wall-clock data and signal ids are content-derived, so
//! replaying the same history under the same config yields bit-identical
//! outcomes. [`canonical_checksum`] makes that checkable.

use crate::InfraWatchError;
use crate::engine::{CycleOutcome, Engine};
use crate::snapshot::{SnapshotHistory, SnapshotSource};

/// Evaluate every snapshot of `history` in capture order.
///
/// Each snapshot is compared with the newest snapshot at or before its
/// capture instant minus the engine's lookback.
pub fn replay(
    engine: &Engine,
    history: &SnapshotHistory,
) -> Result<Vec<CycleOutcome>, InfraWatchError> {
    let lookback = engine.lookback();
    history
        .iter()
        .map(|snapshot| engine.evaluate(snapshot, history.comparison_for(snapshot, lookback)))
        .collect()
}

/// Postcard encoding of an outcome. Stable across runs.
pub fn canonical_bytes(outcome: &CycleOutcome) -> Result<Vec<u8>, InfraWatchError> {
    postcard::to_allocvec(outcome)
        .map_err(|e| InfraWatchError::SerializationError(format!("Outcome: {}", e)))
}

/// Rotate-xor checksum of the canonical encoding.
///
/// Fast and deterministic, not collision resistant. Use
/// [`canonical_crypto_hash`] when that matters.
pub fn canonical_checksum(outcome: &CycleOutcome) -> Result<u64, InfraWatchError> {
    Ok(checksum_bytes(&canonical_bytes(outcome)?))
}

/// Checksum over a whole replay, order sensitive.
pub fn replay_checksum(outcomes: &[CycleOutcome]) -> Result<u64, InfraWatchError> {
    let mut hash: u64 = 0;
    for outcome in outcomes {
        hash = hash.rotate_left(13) ^ canonical_checksum(outcome)?;
    }
    Ok(hash)
}

fn checksum_bytes(data: &[u8]) -> u64 {
    let mut hash = data.len() as u64;
    for byte in data {
        hash = hash.rotate_left(7) ^ u64::from(*byte);
    }
    hash
}

/// BLAKE3 hash of the canonical encoding, as 64 hex characters.
///
/// # Requires
///
/// This function is only available with the `crypto-hash` feature enabled.
#[cfg(feature = "crypto-hash")]
pub fn canonical_crypto_hash(outcome: &CycleOutcome) -> Result<String, InfraWatchError> {
    let data = canonical_bytes(outcome)?;
    Ok(blake3::hash(&data).to_hex().to_string())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::snapshot::{MetricsSnapshot, PriceKey};
    use crate::{SignalType, ValueRange};
    use chrono::{DateTime, Utc};

    fn day(d: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600 + d * 86_400, 0).unwrap_or_default()
    }

    fn history() -> SnapshotHistory {
        let key = PriceKey::new("openai", "gpt-4o", "input");
        let range = |low, high| ValueRange::new(low, high).expect("range");
        SnapshotHistory::from_snapshots(vec![
            MetricsSnapshot::new(day(0))
                .with_price(key.clone(), 100.0)
                .with_coverage(range(0.28, 0.40)),
            MetricsSnapshot::new(day(7))
                .with_price(key.clone(), 90.0)
                .with_coverage(range(0.31, 0.45)),
            MetricsSnapshot::new(day(14))
                .with_price(key, 89.0)
                .with_coverage(range(0.29, 0.38)),
        ])
        .expect("history")
    }

    #[test]
    fn replay_follows_capture_order() {
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let outcomes = replay(&engine, &history()).expect("replay");

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].signals.is_empty());
        assert_eq!(outcomes[0].compared_with, None);

        let crossings: Vec<usize> = outcomes
            .iter()
            .map(|o| {
                o.signals
                    .iter()
                    .filter(|s| s.signal_type == SignalType::ThresholdCrossing)
                    .count()
            })
            .collect();
        assert_eq!(crossings, vec![0, 1, 1]);
    }

    #[test]
    fn replay_is_bit_identical() {
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let first = replay(&engine, &history()).expect("replay");
        let second = replay(&engine, &history()).expect("replay");

        assert_eq!(first, second);
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(
                canonical_bytes(a).expect("bytes"),
                canonical_bytes(b).expect("bytes")
            );
        }
        assert_eq!(
            replay_checksum(&first).expect("checksum"),
            replay_checksum(&second).expect("checksum")
        );
    }

    #[test]
    fn checksum_changes_with_outcome() {
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let outcomes = replay(&engine, &history()).expect("replay");
        let a = canonical_checksum(&outcomes[1]).expect("checksum");
        let b = canonical_checksum(&outcomes[2]).expect("checksum");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_history_replays_to_nothing() {
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let outcomes = replay(&engine, &SnapshotHistory::new()).expect("replay");
        assert!(outcomes.is_empty());
        assert_eq!(replay_checksum(&outcomes).expect("checksum"), 0);
    }

    #[cfg(feature = "crypto-hash")]
    #[test]
    fn crypto_hash_is_hex() {
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let outcomes = replay(&engine, &history()).expect("replay");
        let hash = canonical_crypto_hash(&outcomes[0]).expect("hash");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
