//! Human-readable ticket identifiers.
//!
//! Format: `<PREFIX>-<YYYYMMDD>-<HHMMSSmmm>-<NNNN>`, e.g.
//! `RP-20240101-093015123-4821`.
//!
//! - `PREFIX` is derived from the category (see [`category_prefix`]).
//! - The date and time parts come from `now` in UTC, down to milliseconds.
//! - `NNNN` is a uniform random number in `1000..=9999`.
//!
//! Two ids only collide when generated in the same millisecond *and* the
//! suffix repeats (1 in 9000). Ids are not secrets and are not meant to be
//! unguessable.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Range of the random suffix. Four digits, never a leading zero.
pub const SUFFIX_RANGE: std::ops::RangeInclusive<u16> = 1000..=9999;

/// Two-letter prefix for a category.
///
/// `repair` → `RP`, `buytrade` → `BT`. Other categories use their first two
/// ASCII alphanumerics, uppercased; categories with fewer than two fall back
/// to `TK`.
#[must_use]
pub fn category_prefix(category: &str) -> String {
    match category {
        "repair" => "RP".to_string(),
        "buytrade" => "BT".to_string(),
        other => {
            let letters: String = other
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .take(2)
                .map(|c| c.to_ascii_uppercase())
                .collect();
            if letters.len() == 2 {
                letters
            } else {
                "TK".to_string()
            }
        }
    }
}

/// Generates ticket ids from a timestamp, a category and a random source.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    rng: StdRng,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    /// Generator seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator for tests and simulations.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Produce an id for a record of `category` created at `now`.
    pub fn generate(&mut self, now: DateTime<Utc>, category: &str) -> String {
        let suffix = self.rng.gen_range(SUFFIX_RANGE);
        format!(
            "{}-{}-{}",
            category_prefix(category),
            now.format("%Y%m%d-%H%M%S%3f"),
            suffix
        )
    }
}
