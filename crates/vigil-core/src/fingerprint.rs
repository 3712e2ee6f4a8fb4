//! Deterministic fingerprints and day bucketing.
//!
//! A fingerprint is a SHA-256 hex digest over a canonical `|`-joined part
//! list. Identical inputs always yield identical fingerprints, which makes
//! snapshot writes and alert dedup idempotent across processes.

use crate::{Horizon, Preset, Role, Symbol};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Normalize a timestamp to its UTC-midnight day bucket.
pub fn day_bucket(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc()
}

/// Canonical day label for fingerprinting (e.g. "2024-06-01").
pub fn day_label(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

/// Fingerprint over an ordered part list.
pub fn fingerprint_of(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Deterministic snapshot fingerprint.
///
/// Keyed by (symbol, horizon, preset, role, UTC day of creation, policy
/// hash). Two snapshot attempts for the same tuple on the same day always
/// collide, which is what makes the snapshot store's insert-if-absent an
/// exactly-once write.
pub fn snapshot_fingerprint(
    symbol: &Symbol,
    horizon: Horizon,
    preset: Preset,
    role: Role,
    as_of: DateTime<Utc>,
    policy_hash: &str,
) -> String {
    fingerprint_of(&[
        symbol.as_str(),
        horizon.label(),
        &preset.to_string(),
        &role.to_string(),
        &day_label(day_bucket(as_of)),
        policy_hash,
    ])
}
