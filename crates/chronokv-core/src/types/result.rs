use crate::types::key::{QualifiedKey, Value};
use crate::types::time::Period;
use std::collections::BTreeSet;

/// Point read result together with the window in which it stays valid
///
/// A *hit* means the store holds an entry for the key at or before the
/// requested timestamp; the entry may still be a deletion (`value == None`).
/// A *miss* means no entry exists locally, which is what triggers delegation
/// to the origin branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangedGetResult {
    key: QualifiedKey,
    value: Option<Value>,
    period: Period,
    hit: bool,
}

impl RangedGetResult {
    pub fn hit(key: QualifiedKey, value: Option<Value>, period: Period) -> Self {
        Self {
            key,
            value,
            period,
            hit: true,
        }
    }

    pub fn miss(key: QualifiedKey, period: Period) -> Self {
        Self {
            key,
            value: None,
            period,
            hit: false,
        }
    }

    pub fn key(&self) -> &QualifiedKey {
        &self.key
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<Value> {
        self.value
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn is_hit(&self) -> bool {
        self.hit
    }

    /// Same result with a different validity window.
    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    /// Copy that shares no value buffer with `self`.
    pub fn deep_copy(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: self.value.as_deref().map(Value::from),
            period: self.period,
            hit: self.hit,
        }
    }
}

/// Keys whose latest entry (at some timestamp) is a value vs. a deletion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySetModifications {
    pub additions: BTreeSet<String>,
    pub removals: BTreeSet<String>,
}

impl KeySetModifications {
    /// Apply these modifications on top of an inherited key set.
    pub fn apply_to(&self, keys: &mut BTreeSet<String>) {
        for key in &self.removals {
            keys.remove(key);
        }
        keys.extend(self.additions.iter().cloned());
    }
}
