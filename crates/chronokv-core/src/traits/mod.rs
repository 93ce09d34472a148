pub mod backend;
pub mod cache;
pub mod index;
pub mod matrix;

pub use backend::{StorageBackend, WalTokenStore};
pub use cache::{CacheLookup, TemporalCache};
pub use index::IndexManager;
pub use matrix::{CommitMetadataStore, TemporalDataMatrix};
