//! Bounded cache of ranged point reads
//!
//! Each qualified key maps to the validity-period results learned for it.
//! A lookup at timestamp `t` is a hit when one of those periods contains
//! `t`. Commits write through so that open-ended periods are capped at the
//! commit timestamp and the new value is known from it onward.
//!
//! Eviction is per qualified key:
//! - **FIFO** (default) evicts the oldest inserted key
//! - **LRU** evicts the key that has not been read the longest

use chronokv_core::observe;
use chronokv_core::{
    CacheLookup, EvictionPolicy, Period, QualifiedKey, RangedGetResult, Result, TemporalCache,
    Timestamp, Value, TIMESTAMP_INFINITY,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

/// Eviction order over qualified keys
///
/// Every key carries a tick from a counter that only grows; the smallest
/// tick is the next victim. FIFO stamps a key once on admission, LRU
/// restamps it on every hit.
#[derive(Default)]
struct EvictionOrder {
    next_tick: u64,
    by_tick: BTreeMap<u64, QualifiedKey>,
    ticks: HashMap<QualifiedKey, u64>,
}

impl EvictionOrder {
    fn touch(&mut self, key: &QualifiedKey) {
        let tick = self.next_tick;
        self.next_tick += 1;
        if let Some(previous) = self.ticks.insert(key.clone(), tick) {
            self.by_tick.remove(&previous);
        }
        self.by_tick.insert(tick, key.clone());
    }

    fn pop_oldest(&mut self) -> Option<QualifiedKey> {
        let (_, key) = self.by_tick.pop_first()?;
        self.ticks.remove(&key);
        Some(key)
    }

    fn remove(&mut self, key: &QualifiedKey) {
        if let Some(tick) = self.ticks.remove(key) {
            self.by_tick.remove(&tick);
        }
    }

    fn clear(&mut self) {
        self.by_tick.clear();
        self.ticks.clear();
    }
}

/// Statistics about the cache state
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Cached qualified keys
    pub keys: usize,
    /// Cached results across all keys
    pub results: usize,
    pub capacity: usize,
    pub policy: EvictionPolicy,
}

/// Thread-safe temporal read cache
///
/// `DashMap` holds the results; an [`EvictionOrder`] bounds the number of
/// keys.
pub struct InMemoryTemporalCache {
    entries: DashMap<QualifiedKey, Vec<RangedGetResult>>,
    capacity: usize,
    policy: EvictionPolicy,
    order: Mutex<EvictionOrder>,
}

impl InMemoryTemporalCache {
    /// Cache holding at most `capacity` keys, FIFO eviction
    pub fn new(capacity: usize) -> Self {
        Self::with_policy(capacity, EvictionPolicy::Fifo)
    }

    pub fn with_policy(capacity: usize, policy: EvictionPolicy) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity),
            capacity: capacity.max(1),
            policy,
            order: Mutex::new(EvictionOrder::default()),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            keys: self.entries.len(),
            results: self.entries.iter().map(|e| e.value().len()).sum(),
            capacity: self.capacity,
            policy: self.policy,
        }
    }

    /// Make room for `key` if it is not cached yet and track it for eviction.
    fn admit(&self, key: &QualifiedKey) {
        if self.entries.contains_key(key) {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.evict_one();
        }
        self.order.lock().touch(key);
    }

    fn evict_one(&self) {
        let mut order = self.order.lock();
        // Skip keys already dropped by rollback or invalidation
        while let Some(key) = order.pop_oldest() {
            if self.entries.remove(&key).is_some() {
                break;
            }
        }
    }

    fn forget(&self, key: &QualifiedKey) {
        self.order.lock().remove(key);
    }
}

impl TemporalCache for InMemoryTemporalCache {
    fn get(&self, timestamp: Timestamp, key: &QualifiedKey) -> CacheLookup {
        let found = self.entries.get(key).and_then(|results| {
            results
                .iter()
                .find(|r| r.period().contains(timestamp))
                .cloned()
        });
        observe::record_cache_lookup(found.is_some());

        match found {
            Some(result) => {
                if self.policy == EvictionPolicy::Lru {
                    self.order.lock().touch(key);
                }
                CacheLookup::Hit(result)
            }
            None => CacheLookup::Miss,
        }
    }

    fn cache(&self, result: &RangedGetResult) {
        let key = result.key();
        self.admit(key);
        let mut results = self.entries.entry(key.clone()).or_default();
        let period = result.period();
        let known = results.iter().any(|r| r.period().contains(period.from()));
        if !known {
            // A write-through that overtook this read bounds its validity
            let upper = results
                .iter()
                .map(|r| r.period().from())
                .filter(|from| *from > period.from() && *from < period.to())
                .min();
            match upper {
                Some(upper) => {
                    results.push(result.clone().with_period(period.with_upper_bound(upper)))
                }
                None => results.push(result.clone()),
            }
        }
        drop(results);
        observe::set_cache_size(self.entries.len());
    }

    fn write_through(
        &self,
        timestamp: Timestamp,
        values: &BTreeMap<QualifiedKey, Option<Value>>,
    ) -> Result<()> {
        for (key, value) in values {
            self.admit(key);
            let mut results = self.entries.entry(key.clone()).or_default();
            results.retain(|r| r.period().from() < timestamp);
            for result in results.iter_mut() {
                if result.period().to() > timestamp {
                    let capped = result.period().with_upper_bound(timestamp);
                    *result = result.clone().with_period(capped);
                }
            }
            results.push(RangedGetResult::hit(
                key.clone(),
                value.clone(),
                Period::open_ended(timestamp),
            ));
        }
        observe::set_cache_size(self.entries.len());
        Ok(())
    }

    fn rollback_to_timestamp(&self, timestamp: Timestamp) -> Result<()> {
        let mut emptied = Vec::new();
        for mut entry in self.entries.iter_mut() {
            let results = entry.value_mut();
            results.retain(|r| r.period().from() <= timestamp);
            for result in results.iter_mut() {
                // Capped by a write that no longer exists
                if result.period().to() > timestamp && !result.period().is_open_ended() {
                    *result = result
                        .clone()
                        .with_period(result.period().with_upper_bound(TIMESTAMP_INFINITY));
                }
            }
            if results.is_empty() {
                emptied.push(entry.key().clone());
            }
        }
        for key in emptied {
            self.entries.remove(&key);
            self.forget(&key);
        }
        observe::set_cache_size(self.entries.len());
        Ok(())
    }

    fn invalidate(&self, key: &QualifiedKey) {
        if self.entries.remove(key).is_some() {
            self.forget(key);
        }
        observe::set_cache_size(self.entries.len());
    }

    fn clear(&self) {
        self.entries.clear();
        self.order.lock().clear();
        observe::set_cache_size(0);
    }

    fn size(&self) -> usize {
        self.entries.len()
    }
}
