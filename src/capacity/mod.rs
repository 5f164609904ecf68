//! Storage capacity oracle
//!
//! External collaborator that measures how many bytes a path occupies.
//! The filesystem implementation walks the tree on a blocking thread; a
//! missing path counts as zero rather than failing, since a workspace may
//! not have written anything yet.

use crate::error::WorkfoldResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Measures used storage under a path.
#[async_trait]
pub trait CapacityOracle: Send + Sync {
    /// Bytes used under `path`.
    async fn used_space(&self, path: &Path) -> WorkfoldResult<u64>;
}

/// Filesystem-backed oracle.
#[derive(Debug, Default, Clone)]
pub struct FsCapacityOracle;

#[async_trait]
impl CapacityOracle for FsCapacityOracle {
    async fn used_space(&self, path: &Path) -> WorkfoldResult<u64> {
        let path: PathBuf = path.to_path_buf();
        let size = tokio::task::spawn_blocking(move || dir_size(&path))
            .await
            .map_err(|e| crate::error::WorkfoldError::Io(std::io::Error::other(e)))??;
        Ok(size)
    }
}

fn dir_size(path: &Path) -> WorkfoldResult<u64> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        // tolerate paths that do not exist yet
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    if metadata.is_file() {
        return Ok(metadata.len());
    }
    if !metadata.is_dir() {
        // symlinks and special files are not charged to the workspace
        return Ok(0);
    }

    let mut total = 0u64;
    for entry in std::fs::read_dir(path)? {
        total += dir_size(&entry?.path())?;
    }
    Ok(total)
}
