use chronokv_core::{
    ChronoError, KeySetModifications, Period, QualifiedKey, RangedGetResult, Result,
    TemporalDataMatrix, TemporalEntry, TemporalKey, Timestamp, Value, TIMESTAMP_INFINITY,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

#[derive(Default)]
struct Entries {
    /// (key, timestamp) -> value; `None` marks a deletion
    by_key: BTreeMap<(String, Timestamp), Option<Value>>,
    /// (timestamp, key), for range scans and rollback
    by_time: BTreeSet<(Timestamp, String)>,
}

impl Entries {
    fn insert(&mut self, timestamp: Timestamp, key: String, value: Option<Value>) {
        self.by_time.insert((timestamp, key.clone()));
        self.by_key.insert((key, timestamp), value);
    }
}

/// Temporal matrix held in two ordered maps
pub struct InMemoryMatrix {
    branch: String,
    keyspace: String,
    creation_timestamp: Timestamp,
    entries: RwLock<Entries>,
}

impl InMemoryMatrix {
    pub fn new(
        branch: impl Into<String>,
        keyspace: impl Into<String>,
        creation_timestamp: Timestamp,
    ) -> Self {
        Self {
            branch: branch.into(),
            keyspace: keyspace.into(),
            creation_timestamp,
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Number of stored entries (all versions)
    pub fn len(&self) -> usize {
        self.entries.read().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_timestamp(&self, timestamp: Timestamp) -> Result<()> {
        if timestamp < self.creation_timestamp {
            return Err(ChronoError::InvalidTimestamp(format!(
                "write at {} precedes creation of keyspace '{}' on branch '{}' at {}",
                timestamp, self.keyspace, self.branch, self.creation_timestamp
            )));
        }
        Ok(())
    }
}

impl TemporalDataMatrix for InMemoryMatrix {
    fn branch(&self) -> &str {
        &self.branch
    }

    fn keyspace(&self) -> &str {
        &self.keyspace
    }

    fn creation_timestamp(&self) -> Timestamp {
        self.creation_timestamp
    }

    fn get(&self, timestamp: Timestamp, key: &str) -> Result<RangedGetResult> {
        let entries = self.entries.read();
        let qualified = QualifiedKey::new(self.keyspace.clone(), key);

        let floor = entries
            .by_key
            .range((key.to_string(), 0)..=(key.to_string(), timestamp))
            .next_back()
            .map(|((_, ts), value)| (*ts, value.clone()));
        let ceiling = entries
            .by_key
            .range((
                Bound::Excluded((key.to_string(), timestamp)),
                Bound::Included((key.to_string(), TIMESTAMP_INFINITY)),
            ))
            .next()
            .map(|((_, ts), _)| *ts)
            .unwrap_or(TIMESTAMP_INFINITY);

        Ok(match floor {
            Some((from, value)) => {
                RangedGetResult::hit(qualified, value, Period::new(from, ceiling))
            }
            None => RangedGetResult::miss(qualified, Period::new(0, ceiling)),
        })
    }

    fn put(&self, timestamp: Timestamp, contents: &BTreeMap<String, Option<Value>>) -> Result<()> {
        self.check_timestamp(timestamp)?;
        let mut entries = self.entries.write();
        for (key, value) in contents {
            entries.insert(timestamp, key.clone(), value.clone());
        }
        Ok(())
    }

    fn history(&self, max_timestamp: Timestamp, key: &str) -> Result<Vec<Timestamp>> {
        let entries = self.entries.read();
        Ok(entries
            .by_key
            .range((key.to_string(), 0)..=(key.to_string(), max_timestamp))
            .rev()
            .map(|((_, ts), _)| *ts)
            .collect())
    }

    fn modifications_between(
        &self,
        lower: Timestamp,
        upper: Timestamp,
    ) -> Result<Vec<TemporalKey>> {
        if upper < lower {
            return Err(ChronoError::InvalidTimestamp(format!(
                "upper bound {} is below lower bound {}",
                upper, lower
            )));
        }
        let entries = self.entries.read();
        Ok(entries
            .by_time
            .range((lower, String::new())..)
            .take_while(|(ts, _)| *ts <= upper)
            .map(|(ts, key)| TemporalKey {
                timestamp: *ts,
                key: key.clone(),
            })
            .collect())
    }

    fn insert_entries(&self, new_entries: Vec<TemporalEntry>) -> Result<()> {
        for entry in &new_entries {
            self.check_timestamp(entry.timestamp)?;
        }
        let mut entries = self.entries.write();
        for entry in new_entries {
            entries.insert(entry.timestamp, entry.key, entry.value);
        }
        Ok(())
    }

    fn rollback(&self, timestamp: Timestamp) -> Result<()> {
        if timestamp == TIMESTAMP_INFINITY {
            return Ok(());
        }
        let mut entries = self.entries.write();
        let removed = entries.by_time.split_off(&(timestamp + 1, String::new()));
        for (ts, key) in removed {
            entries.by_key.remove(&(key, ts));
        }
        Ok(())
    }

    fn rollback_keys(&self, timestamp: Timestamp, keys: &BTreeSet<String>) -> Result<()> {
        if timestamp == TIMESTAMP_INFINITY {
            return Ok(());
        }
        let mut entries = self.entries.write();
        for key in keys {
            let removed: Vec<Timestamp> = entries
                .by_key
                .range((key.clone(), timestamp + 1)..=(key.clone(), TIMESTAMP_INFINITY))
                .map(|((_, ts), _)| *ts)
                .collect();
            for ts in removed {
                entries.by_key.remove(&(key.clone(), ts));
                entries.by_time.remove(&(ts, key.clone()));
            }
        }
        Ok(())
    }

    fn last_commit_timestamp(&self, key: &str) -> Result<Option<Timestamp>> {
        let entries = self.entries.read();
        Ok(entries
            .by_key
            .range((key.to_string(), 0)..=(key.to_string(), TIMESTAMP_INFINITY))
            .next_back()
            .map(|((_, ts), _)| *ts))
    }

    fn key_set_modifications(&self, timestamp: Timestamp) -> Result<KeySetModifications> {
        let entries = self.entries.read();
        let mut latest: BTreeMap<&str, bool> = BTreeMap::new();
        // by_key is ordered by (key, ts), so the last visible write per key wins
        for ((key, ts), value) in entries.by_key.iter() {
            if *ts <= timestamp {
                latest.insert(key.as_str(), value.is_some());
            }
        }

        let mut modifications = KeySetModifications::default();
        for (key, present) in latest {
            if present {
                modifications.additions.insert(key.to_string());
            } else {
                modifications.removals.insert(key.to_string());
            }
        }
        Ok(modifications)
    }

    fn entries(&self, max_timestamp: Timestamp) -> Result<Vec<TemporalEntry>> {
        let entries = self.entries.read();
        Ok(entries
            .by_time
            .iter()
            .take_while(|(ts, _)| *ts <= max_timestamp)
            .map(|(ts, key)| {
                let value = entries.by_key.get(&(key.clone(), *ts)).cloned().flatten();
                TemporalEntry::new(*ts, key.clone(), value)
            })
            .collect())
    }
}
