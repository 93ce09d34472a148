use serde::{Deserialize, Serialize};
use std::fmt;

/// Commit timestamp, milliseconds since the UNIX epoch (logical on collision)
pub type Timestamp = u64;

/// Upper bound of a period that has not been superseded yet
pub const TIMESTAMP_INFINITY: Timestamp = u64::MAX;

/// Half-open validity window `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    from: Timestamp,
    to: Timestamp,
}

impl Period {
    /// Create a period. `to` must be strictly greater than `from`.
    pub fn new(from: Timestamp, to: Timestamp) -> Self {
        debug_assert!(to > from, "empty period [{from}, {to})");
        Self { from, to }
    }

    /// `[0, +inf)`
    pub fn eternal() -> Self {
        Self::new(0, TIMESTAMP_INFINITY)
    }

    /// `[from, +inf)`
    pub fn open_ended(from: Timestamp) -> Self {
        Self::new(from, TIMESTAMP_INFINITY)
    }

    pub fn from(&self) -> Timestamp {
        self.from
    }

    pub fn to(&self) -> Timestamp {
        self.to
    }

    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.from <= timestamp && timestamp < self.to
    }

    pub fn is_open_ended(&self) -> bool {
        self.to == TIMESTAMP_INFINITY
    }

    /// Same lower bound, upper bound replaced.
    pub fn with_upper_bound(&self, to: Timestamp) -> Self {
        Self::new(self.from, to)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_open_ended() {
            write!(f, "[{}, inf)", self.from)
        } else {
            write!(f, "[{}, {})", self.from, self.to)
        }
    }
}
