//! ID generation utilities for Upsellr
//!
//! Provides functions for generating unique identifiers for decision records.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a unique decision ID
///
/// Format: `dec-{timestamp_ms}-{random_hex}`
/// Example: `dec-1738300800123-a1b2`
pub fn generate_decision_id() -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("dec-{}-{:04x}", timestamp, random)
}

/// Stable hex digest of the given parts, separated so ("ab","c") != ("a","bc").
pub fn stable_digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}
