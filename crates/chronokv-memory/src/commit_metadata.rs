use chronokv_core::{ChronoError, CommitMetadataStore, Result, Timestamp, TIMESTAMP_INFINITY};
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct InMemoryCommitMetadataStore {
    entries: RwLock<BTreeMap<Timestamp, Vec<u8>>>,
}

impl InMemoryCommitMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommitMetadataStore for InMemoryCommitMetadataStore {
    fn put(&self, timestamp: Timestamp, metadata: Vec<u8>) -> Result<()> {
        self.entries.write().insert(timestamp, metadata);
        Ok(())
    }

    fn get(&self, timestamp: Timestamp) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(&timestamp).cloned())
    }

    fn rollback_to_timestamp(&self, timestamp: Timestamp) -> Result<()> {
        if timestamp < TIMESTAMP_INFINITY {
            self.entries.write().split_off(&(timestamp + 1));
        }
        Ok(())
    }

    fn timestamps_between(&self, lower: Timestamp, upper: Timestamp) -> Result<Vec<Timestamp>> {
        if upper < lower {
            return Err(ChronoError::InvalidTimestamp(format!(
                "upper bound {} is below lower bound {}",
                upper, lower
            )));
        }
        Ok(self
            .entries
            .read()
            .range(lower..=upper)
            .map(|(ts, _)| *ts)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_rollback() {
        let store = InMemoryCommitMetadataStore::new();
        store.put(10, b"first".to_vec()).unwrap();
        store.put(20, b"second".to_vec()).unwrap();

        assert_eq!(store.get(10).unwrap().as_deref(), Some(&b"first"[..]));
        assert_eq!(store.timestamps_between(0, 100).unwrap(), vec![10, 20]);

        store.rollback_to_timestamp(15).unwrap();
        assert!(store.get(20).unwrap().is_none());
        assert_eq!(store.timestamps_between(0, 100).unwrap(), vec![10]);
    }
}
