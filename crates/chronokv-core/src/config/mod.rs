use crate::error::{ChronoError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Duplicate version elimination policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateVersionElimination {
    /// Every change-set entry produces a new version
    Disabled,

    /// Entries whose value equals the current head value are dropped at commit (default)
    #[default]
    OnCommit,
}

/// Value codec used by typed transaction methods
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    #[default]
    Json,
    MsgPack,
}

/// Eviction policy for the read cache
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Evict the oldest inserted key (default)
    #[default]
    Fifo,
    /// Evict the key that has not been read the longest
    Lru,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChronoConfig {
    /// Enable the temporal read cache (default: true)
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Maximum number of qualified keys held by the cache (default: 10,000)
    #[serde(default = "default_cache_max_size")]
    pub cache_max_size: usize,

    #[serde(default)]
    pub cache_eviction: EvictionPolicy,

    /// Callers promise never to mutate values returned from reads (default: false)
    ///
    /// When false, reads served through the cache are deep-copied so that
    /// cached buffers are never shared with callers.
    #[serde(default)]
    pub assume_cache_values_immutable: bool,

    #[serde(default)]
    pub duplicate_version_elimination: DuplicateVersionElimination,

    /// Reject commits that overwrite keys modified after the transaction opened (default: true)
    #[serde(default = "default_true")]
    pub blind_overwrite_protection: bool,

    #[serde(default)]
    pub codec: CodecKind,

    /// Directory for file-backed WAL tokens
    ///
    /// When unset, WAL tokens live in the storage backend.
    #[serde(default)]
    pub wal_dir: Option<PathBuf>,
}

impl Default for ChronoConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_max_size: default_cache_max_size(),
            cache_eviction: EvictionPolicy::default(),
            assume_cache_values_immutable: false,
            duplicate_version_elimination: DuplicateVersionElimination::default(),
            blind_overwrite_protection: true,
            codec: CodecKind::default(),
            wal_dir: None,
        }
    }
}

impl ChronoConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_cache_max_size(mut self, size: usize) -> Self {
        self.cache_max_size = size;
        self
    }

    pub fn with_cache_eviction(mut self, policy: EvictionPolicy) -> Self {
        self.cache_eviction = policy;
        self
    }

    pub fn with_immutable_cache_values(mut self, immutable: bool) -> Self {
        self.assume_cache_values_immutable = immutable;
        self
    }

    pub fn with_duplicate_version_elimination(mut self, mode: DuplicateVersionElimination) -> Self {
        self.duplicate_version_elimination = mode;
        self
    }

    pub fn with_blind_overwrite_protection(mut self, enabled: bool) -> Self {
        self.blind_overwrite_protection = enabled;
        self
    }

    pub fn with_codec(mut self, codec: CodecKind) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_wal_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.wal_dir = Some(dir.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_enabled && self.cache_max_size == 0 {
            return Err(ChronoError::Config(
                "cache_max_size must be > 0 when the cache is enabled".into(),
            ));
        }
        if let Some(dir) = &self.wal_dir {
            if dir.as_os_str().is_empty() {
                return Err(ChronoError::Config("wal_dir must not be empty".into()));
            }
        }
        Ok(())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|e| ChronoError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| ChronoError::Serialization(e.to_string()))?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_max_size() -> usize {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: ChronoConfig = serde_json::from_str("{}").unwrap();
        assert!(config.cache_enabled);
        assert_eq!(config.cache_max_size, 10_000);
        assert_eq!(config.cache_eviction, EvictionPolicy::Fifo);
        assert!(!config.assume_cache_values_immutable);
        assert_eq!(
            config.duplicate_version_elimination,
            DuplicateVersionElimination::OnCommit
        );
        assert!(config.blind_overwrite_protection);
        assert_eq!(config.codec, CodecKind::Json);
        assert!(config.wal_dir.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_cache() {
        let config = ChronoConfig::new().with_cache_max_size(0);
        assert!(matches!(config.validate(), Err(ChronoError::Config(_))));
        assert!(config.with_cache(false).validate().is_ok());
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chronokv.json");
        let config = ChronoConfig::new()
            .with_codec(CodecKind::MsgPack)
            .with_duplicate_version_elimination(DuplicateVersionElimination::Disabled);
        config.to_json_file(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"msg_pack\""));

        let loaded = ChronoConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded.codec, CodecKind::MsgPack);
        assert_eq!(
            loaded.duplicate_version_elimination,
            DuplicateVersionElimination::Disabled
        );
    }
}
