//! Price-table compiler and evaluator for trade auto-answering.
//!
//! A table is user-authored text like `1-100(*-50),101-200(*-40)`: an ordered
//! list of price ranges, each with a non-positive bonus applied to offers that
//! fall in (or nearest below) the range. Unlike the rest of the pipeline this
//! component reports hard compile errors: the table string comes from a
//! validation UI, not from page content, so bad input must be surfaced, not
//! swallowed.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PriceTableError {
    #[error("empty price table")]
    Empty,

    #[error("malformed range group: {0:?}")]
    MalformedGroup(String),

    #[error("numeric token out of range in group: {0:?}")]
    NumberOutOfRange(String),

    #[error("inverted range {low}-{high} (low must not exceed high)")]
    InvertedRange { low: i64, high: i64 },

    #[error("positive bonus {0} (bonus must be zero or negative)")]
    PositiveBonus(i64),
}

/// One compiled `low-high(bonus)` group. `low <= high`, `bonus <= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub low: i64,
    pub high: i64,
    pub bonus: i64,
}

/// An immutable, ordered list of [`PriceRange`]s. Declaration order is
/// significant: overlapping ranges resolve to the earliest declared match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTable {
    ranges: Vec<PriceRange>,
}

fn group_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)-(\d+)\((-?\d+)\)$").expect("static regex must compile"))
}

impl PriceTable {
    /// Compile a table string into an ordered range list.
    ///
    /// Accepted shorthands per group: `(0)` for a zero bonus, `(-N)` and
    /// `(*-N)` for `bonus = -N`. Whitespace and newlines are ignored
    /// everywhere. Fails on a missing numeric token, `low > high`, or a
    /// positive bonus.
    pub fn compile(source: &str) -> Result<Self, PriceTableError> {
        // Strip all whitespace, then normalize `(*-N)` / `(*0)` to `(-N)` / `(0)`
        // so one grammar covers every shorthand.
        let normalized: String = source.chars().filter(|c| !c.is_whitespace()).collect();
        let normalized = normalized.replace("(*", "(");

        let mut ranges = Vec::new();
        for group in normalized.split(',') {
            if group.is_empty() {
                continue;
            }
            let caps = group_regex()
                .captures(group)
                .ok_or_else(|| PriceTableError::MalformedGroup(group.to_string()))?;
            let low: i64 = caps[1]
                .parse()
                .map_err(|_| PriceTableError::NumberOutOfRange(group.to_string()))?;
            let high: i64 = caps[2]
                .parse()
                .map_err(|_| PriceTableError::NumberOutOfRange(group.to_string()))?;
            let bonus: i64 = caps[3]
                .parse()
                .map_err(|_| PriceTableError::NumberOutOfRange(group.to_string()))?;

            if low > high {
                return Err(PriceTableError::InvertedRange { low, high });
            }
            if bonus > 0 {
                return Err(PriceTableError::PositiveBonus(bonus));
            }
            ranges.push(PriceRange { low, high, bonus });
        }

        if ranges.is_empty() {
            return Err(PriceTableError::Empty);
        }
        Ok(Self { ranges })
    }

    /// Evaluate an offered price against the table.
    ///
    /// A range that contains the price wins outright. Otherwise the range
    /// with the smallest non-negative `price - low` applies, ties resolved to
    /// the earliest declared range. Traders rely on declaration order for
    /// overlapping ranges, so both rules must hold exactly. Returns `0` when
    /// no range satisfies `price >= low`.
    pub fn evaluate(&self, price: i64) -> i64 {
        for range in &self.ranges {
            if range.low <= price && price <= range.high {
                return price + range.bonus;
            }
        }

        let mut best: Option<(i64, i64)> = None; // (diff, bonus)
        for range in &self.ranges {
            if price < range.low {
                continue;
            }
            let diff = price - range.low;
            // Strict `<` keeps the first-declared range on equal distance.
            if best.map(|(d, _)| diff < d).unwrap_or(true) {
                best = Some((diff, range.bonus));
            }
        }
        match best {
            Some((_, bonus)) => price + bonus,
            None => 0,
        }
    }

    pub fn ranges(&self) -> &[PriceRange] {
        &self.ranges
    }
}
