//! Destinations for downloaded archives and reports.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ClientError, ClientResult};

/// Receives a downloaded payload and hands it to the user.
pub trait ArchiveSink: Send + Sync {
    /// Persist `bytes` under `name`, returning where they ended up.
    ///
    /// # Errors
    /// Returns an error when the name is unusable or the write fails.
    fn save(&self, name: &str, bytes: &[u8]) -> ClientResult<PathBuf>;
}

/// Writes payloads into a fixed directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    /// Sink writing into `root`, created on first save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Destination directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn validate_name(name: &str) -> ClientResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed.contains("..")
        || trimmed.contains(['/', '\\'])
    {
        return Err(ClientError::ArchiveName {
            name: name.to_string(),
        });
    }
    Ok(())
}

impl ArchiveSink for DirectorySink {
    fn save(&self, name: &str, bytes: &[u8]) -> ClientResult<PathBuf> {
        validate_name(name)?;
        fs::create_dir_all(&self.root).map_err(|source| ClientError::ArchiveIo {
            path: self.root.clone(),
            source,
        })?;

        let target = self.root.join(name);
        let partial = self.root.join(format!(".{name}.part"));
        fs::write(&partial, bytes).map_err(|source| ClientError::ArchiveIo {
            path: partial.clone(),
            source,
        })?;
        fs::rename(&partial, &target).map_err(|source| ClientError::ArchiveIo {
            path: target.clone(),
            source,
        })?;
        info!(path = %target.display(), bytes = bytes.len(), "download saved");
        Ok(target)
    }
}
