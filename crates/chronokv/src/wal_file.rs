//! File-backed WAL token store
//!
//! One JSON file per branch under a base directory. Writes go to a temporary
//! file that is synced and then renamed over the target, so a crash leaves
//! either the old token or the new one, never a torn file.

use chronokv_core::{ChronoError, Result, WalToken, WalTokenStore};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct FileWalTokenStore {
    base_dir: PathBuf,
}

impl FileWalTokenStore {
    /// Open (and create if needed) the token directory
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    // Lowercase hex is safe on case-insensitive filesystems too.
    fn token_path(&self, branch: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", hex::encode(branch)))
    }
}

impl WalTokenStore for FileWalTokenStore {
    fn read(&self, branch: &str) -> Result<Option<WalToken>> {
        let path = self.token_path(branch);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let token = serde_json::from_slice(&data).map_err(|e| {
            ChronoError::Serialization(format!(
                "Corrupt WAL token {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Some(token))
    }

    fn write(&self, branch: &str, token: &WalToken) -> Result<()> {
        let path = self.token_path(branch);
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec(token)
            .map_err(|e| ChronoError::Serialization(format!("Failed to encode WAL token: {}", e)))?;

        let mut file = File::create(&tmp)?;
        file.write_all(&data)?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;

        debug!(branch, path = %path.display(), "Wrote WAL token");
        Ok(())
    }

    fn clear(&self, branch: &str) -> Result<()> {
        match fs::remove_file(self.token_path(branch)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
