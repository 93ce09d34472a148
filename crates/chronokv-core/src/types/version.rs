use crate::error::{ChronoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Engine format version persisted alongside the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FormatVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Version of the running engine.
    pub fn current() -> Self {
        // Cargo guarantees a valid semver here
        env!("CARGO_PKG_VERSION")
            .parse()
            .unwrap_or(Self::new(0, 1, 0))
    }

    /// Whether data written by `stored` may be opened by `self`.
    ///
    /// Patch releases never change the format, so only major/minor count.
    pub fn can_read(&self, stored: &FormatVersion) -> bool {
        (stored.major, stored.minor) <= (self.major, self.minor)
    }

    /// Fail with `VersionSkew` when `stored` is newer than this engine.
    pub fn check_readable(&self, stored: &FormatVersion) -> Result<()> {
        if self.can_read(stored) {
            Ok(())
        } else {
            Err(ChronoError::VersionSkew {
                stored: stored.to_string(),
                current: self.to_string(),
            })
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for FormatVersion {
    type Err = ChronoError;

    fn from_str(s: &str) -> Result<Self> {
        // Ignore pre-release / build suffixes ("1.2.3-alpha+build")
        let core = s.split(['-', '+']).next().unwrap_or(s);
        let mut parts = core.split('.');
        let mut next = |name: &str| -> Result<u32> {
            parts
                .next()
                .ok_or_else(|| ChronoError::InvalidState(format!("missing {name} in '{s}'")))?
                .parse::<u32>()
                .map_err(|e| ChronoError::InvalidState(format!("bad {name} in '{s}': {e}")))
        };
        let major = next("major")?;
        let minor = next("minor")?;
        let patch = next("patch")?;
        Ok(Self::new(major, minor, patch))
    }
}
