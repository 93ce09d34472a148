use chronokv_core::{PutOption, QualifiedKey, Value};
use std::collections::btree_map::{self, BTreeMap};
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

/// One pending mutation. `None` value means removal.
///
/// Equality and hashing consider the qualified key only, so a change set
/// never holds two entries for the same key.
#[derive(Debug, Clone)]
pub struct ChangeSetEntry {
    key: QualifiedKey,
    value: Option<Value>,
    options: BTreeSet<PutOption>,
}

impl ChangeSetEntry {
    pub fn new(key: QualifiedKey, value: Option<Value>, options: BTreeSet<PutOption>) -> Self {
        Self {
            key,
            value,
            options,
        }
    }

    pub fn key(&self) -> &QualifiedKey {
        &self.key
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn is_removal(&self) -> bool {
        self.value.is_none()
    }

    pub fn has_option(&self, option: PutOption) -> bool {
        self.options.contains(&option)
    }
}

impl PartialEq for ChangeSetEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ChangeSetEntry {}

impl Hash for ChangeSetEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// Pending mutations of a transaction, ordered by qualified key
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    entries: BTreeMap<QualifiedKey, ChangeSetEntry>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Replaces any earlier entry for the same key.
    pub fn insert(&mut self, entry: ChangeSetEntry) {
        self.entries.insert(entry.key.clone(), entry);
    }

    pub fn get(&self, key: &QualifiedKey) -> Option<&ChangeSetEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Values<'_, QualifiedKey, ChangeSetEntry> {
        self.entries.values()
    }

    /// Entries of one keyspace
    pub fn in_keyspace<'a>(
        &'a self,
        keyspace: &'a str,
    ) -> impl Iterator<Item = &'a ChangeSetEntry> {
        self.entries
            .values()
            .filter(move |entry| entry.key.keyspace == keyspace)
    }

    /// Keyspaces that receive at least one value (removals alone do not create a keyspace)
    pub fn keyspaces_with_values(&self) -> BTreeSet<String> {
        self.entries
            .values()
            .filter(|entry| !entry.is_removal())
            .map(|entry| entry.key.keyspace.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a ChangeSetEntry;
    type IntoIter = btree_map::Values<'a, QualifiedKey, ChangeSetEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
