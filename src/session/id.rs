//! Logical user identifier.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Opaque identifier of the user a session belongs to.
///
/// The command router hands these in (chat platforms use signed 64-bit
/// ids); the engines only compare and hash them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(i64);

impl UserId {
    /// Wrap a raw user id.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(UserId)
    }
}
