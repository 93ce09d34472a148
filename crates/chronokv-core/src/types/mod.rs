pub mod branch;
pub mod commit;
pub mod key;
pub mod result;
pub mod time;
pub mod version;
pub mod wal;

pub use branch::{BranchMetadata, MASTER_BRANCH_NAME};
pub use commit::{CommitInfo, IndexChange, PutOption, TransactionId};
pub use key::{ChronoIdentifier, QualifiedKey, TemporalEntry, TemporalKey, Value};
pub use result::{KeySetModifications, RangedGetResult};
pub use time::{Period, Timestamp, TIMESTAMP_INFINITY};
pub use version::FormatVersion;
pub use wal::WalToken;
