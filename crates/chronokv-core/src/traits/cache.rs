use crate::error::Result;
use crate::types::{QualifiedKey, RangedGetResult, Timestamp, Value};
use std::collections::BTreeMap;

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// A cached result whose period contains the requested timestamp
    Hit(RangedGetResult),
    Miss,
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }
}

/// Read cache for ranged point reads of one branch
///
/// Entries are keyed by qualified key and answer any timestamp inside the
/// cached validity period. A miss is never an error.
pub trait TemporalCache: Send + Sync {
    fn get(&self, timestamp: Timestamp, key: &QualifiedKey) -> CacheLookup;

    fn cache(&self, result: &RangedGetResult);

    /// Record values committed at `timestamp` and cap periods they supersede
    fn write_through(
        &self,
        timestamp: Timestamp,
        values: &BTreeMap<QualifiedKey, Option<Value>>,
    ) -> Result<()>;

    /// Forget everything learned about timestamps after `timestamp`
    fn rollback_to_timestamp(&self, timestamp: Timestamp) -> Result<()>;

    /// Forget every cached period of `key`
    fn invalidate(&self, key: &QualifiedKey);

    fn clear(&self);

    /// Number of cached keys
    fn size(&self) -> usize;
}
