//! Branch model and registry
//!
//! Branches form a DAG rooted at master. Each branch records its origin by
//! name; the registry maps names to the [`TemporalKeyValueStore`] serving
//! that branch. Branches are only ever added top-down, so a parent is always
//! registered before its children.

use crate::store::{StoreContext, TemporalKeyValueStore};
use chronokv_core::{BranchMetadata, ChronoError, Result, Timestamp, MASTER_BRANCH_NAME};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// A versioning stream
///
/// Immutable after creation except for the `now` watermark, which only the
/// owning store advances.
#[derive(Debug)]
pub struct Branch {
    metadata: BranchMetadata,
    now: AtomicU64,
}

impl Branch {
    pub fn new(metadata: BranchMetadata, now: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(now.max(metadata.branching_timestamp)),
            metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn origin(&self) -> Option<&str> {
        self.metadata.origin.as_deref()
    }

    pub fn branching_timestamp(&self) -> Timestamp {
        self.metadata.branching_timestamp
    }

    pub fn metadata(&self) -> &BranchMetadata {
        &self.metadata
    }

    pub fn is_master(&self) -> bool {
        self.metadata.is_master()
    }

    /// Timestamp of the latest fully applied commit
    pub fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }

    pub(crate) fn set_now(&self, timestamp: Timestamp) {
        self.now.store(timestamp, Ordering::SeqCst);
    }
}

/// Creates, loads and looks up branches
pub struct BranchManager {
    context: Arc<StoreContext>,
    stores: RwLock<BTreeMap<String, Arc<TemporalKeyValueStore>>>,
    /// Branch names in creation order
    order: RwLock<Vec<String>>,
}

impl BranchManager {
    /// Load every persisted branch, creating master on first open.
    pub(crate) fn load(context: Arc<StoreContext>) -> Result<Self> {
        let manager = Self {
            context,
            stores: RwLock::new(BTreeMap::new()),
            order: RwLock::new(Vec::new()),
        };

        let mut pending = manager.context.backend.load_branches()?;
        if !pending.iter().any(|b| b.name == MASTER_BRANCH_NAME) {
            let master = BranchMetadata::master();
            manager.context.backend.save_branch(&master)?;
            manager.context.backend.set_now(MASTER_BRANCH_NAME, 0)?;
            info!("Created master branch");
            pending.insert(0, master);
        }

        // Parents first, regardless of persisted order
        while !pending.is_empty() {
            let before = pending.len();
            let mut remaining = Vec::new();
            for metadata in pending {
                let ready = match &metadata.origin {
                    None => true,
                    Some(origin) => manager.stores.read().contains_key(origin),
                };
                if ready {
                    manager.register_loaded(metadata)?;
                } else {
                    remaining.push(metadata);
                }
            }
            if remaining.len() == before {
                let names: Vec<_> = remaining.iter().map(|b| b.name.as_str()).collect();
                return Err(ChronoError::Branching(format!(
                    "branches with unknown origin: {}",
                    names.join(", ")
                )));
            }
            pending = remaining;
        }

        Ok(manager)
    }

    fn register_loaded(&self, metadata: BranchMetadata) -> Result<()> {
        let now = self
            .context
            .backend
            .now(&metadata.name)?
            .unwrap_or(metadata.branching_timestamp);
        let origin = match &metadata.origin {
            Some(origin) => Some(self.store(origin)?),
            None => None,
        };
        let name = metadata.name.clone();
        let branch = Arc::new(Branch::new(metadata, now));
        let store = Arc::new(TemporalKeyValueStore::new(
            self.context.clone(),
            branch,
            origin,
        )?);
        self.stores.write().insert(name.clone(), store);
        self.order.write().push(name);
        Ok(())
    }

    /// Fork `name` from `parent` at `branching_timestamp`
    ///
    /// Fails if `name` exists, if `parent` does not, or if the timestamp is
    /// beyond the parent's `now`.
    pub fn create_branch(
        &self,
        parent: &str,
        name: &str,
        branching_timestamp: Timestamp,
    ) -> Result<Arc<TemporalKeyValueStore>> {
        if name.trim().is_empty() {
            return Err(ChronoError::Branching("branch name must not be empty".into()));
        }

        // Held across validation and registration so concurrent creators
        // cannot both claim the same name.
        let mut stores = self.stores.write();
        if stores.contains_key(name) {
            return Err(ChronoError::Branching(format!(
                "branch '{}' already exists",
                name
            )));
        }
        let origin = stores.get(parent).cloned().ok_or_else(|| {
            ChronoError::Branching(format!("parent branch '{}' does not exist", parent))
        })?;
        let parent_now = origin.now();
        if branching_timestamp > parent_now {
            return Err(ChronoError::Branching(format!(
                "branching timestamp {} is after now ({}) of parent branch '{}'",
                branching_timestamp, parent_now, parent
            )));
        }

        let metadata = BranchMetadata::new(name, parent, branching_timestamp);
        self.context.backend.save_branch(&metadata)?;
        self.context.backend.set_now(name, branching_timestamp)?;

        let branch = Arc::new(Branch::new(metadata, branching_timestamp));
        let store = Arc::new(TemporalKeyValueStore::new(
            self.context.clone(),
            branch,
            Some(origin),
        )?);
        stores.insert(name.to_string(), store.clone());
        drop(stores);
        self.order.write().push(name.to_string());

        info!(branch = name, parent, branching_timestamp, "Created branch");
        Ok(store)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.stores.read().contains_key(name)
    }

    /// Fail with a branching error unless existence of `name` equals `expected`
    pub fn assert_branch_name_exists(&self, name: &str, expected: bool) -> Result<()> {
        match (self.exists(name), expected) {
            (true, false) => Err(ChronoError::Branching(format!(
                "branch '{}' already exists",
                name
            ))),
            (false, true) => Err(ChronoError::Branching(format!(
                "branch '{}' does not exist",
                name
            ))),
            _ => Ok(()),
        }
    }

    pub fn store(&self, name: &str) -> Result<Arc<TemporalKeyValueStore>> {
        self.stores
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ChronoError::Branching(format!("branch '{}' does not exist", name)))
    }

    pub fn branch(&self, name: &str) -> Result<Arc<Branch>> {
        Ok(self.store(name)?.branch().clone())
    }

    pub fn master(&self) -> Result<Arc<TemporalKeyValueStore>> {
        self.store(MASTER_BRANCH_NAME)
    }

    /// Chain from master to the direct parent of `name` (master first, `name` excluded)
    pub fn origins_recursive(&self, name: &str) -> Result<Vec<Arc<Branch>>> {
        let mut chain = Vec::new();
        let mut current = self.store(name)?;
        while let Some(origin) = current.origin().cloned() {
            chain.push(origin.branch().clone());
            current = origin;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Branch names in creation order
    pub fn branch_names(&self) -> Vec<String> {
        self.order.read().clone()
    }

    /// Stores in creation order (parents before children)
    pub fn stores(&self) -> Vec<Arc<TemporalKeyValueStore>> {
        let stores = self.stores.read();
        self.order
            .read()
            .iter()
            .filter_map(|name| stores.get(name).cloned())
            .collect()
    }
}
