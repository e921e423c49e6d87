//! Simulated time.

use crate::error::TierError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Simulated timestamp in nanoseconds since the start of the simulation.
pub type SimTime = u64;

const UNITS: [(&str, u64); 4] = [
    ("s", 1_000_000_000),
    ("ms", 1_000_000),
    ("us", 1_000),
    ("ns", 1),
];

/// A simulated duration held in nanoseconds.
///
/// Parses and prints the `<integer><unit>` form used by configuration strings
/// (`"35ns"`, `"5ms"`). Supported units are `ps`, `ns`, `us`, `ms` and `s`;
/// picosecond values must be a whole number of nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SimDuration(u64);

impl SimDuration {
    /// Zero-length duration.
    pub const ZERO: SimDuration = SimDuration(0);

    /// Creates a duration from nanoseconds.
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Creates a duration from milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000_000)
    }

    /// Returns the duration in nanoseconds.
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl FromStr for SimDuration {
    type Err = TierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TierError::InvalidParameter {
            name: "duration".to_string(),
            value: s.to_string(),
        };

        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (digits, unit) = trimmed.split_at(split);
        let value: u64 = digits.parse().map_err(|_| invalid())?;
        if unit.trim() == "ps" {
            return if value % 1_000 == 0 {
                Ok(SimDuration(value / 1_000))
            } else {
                Err(invalid())
            };
        }
        let factor = UNITS
            .iter()
            .find(|(name, _)| *name == unit.trim())
            .map(|(_, factor)| *factor)
            .ok_or_else(invalid)?;

        value.checked_mul(factor).map(SimDuration).ok_or_else(invalid)
    }
}

impl TryFrom<String> for SimDuration {
    type Error = TierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SimDuration> for String {
    fn from(value: SimDuration) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SimDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Largest unit that divides evenly.
        for (name, factor) in UNITS {
            if self.0 != 0 && self.0 % factor == 0 {
                return write!(f, "{}{}", self.0 / factor, name);
            }
        }
        write!(f, "{}ns", self.0)
    }
}
