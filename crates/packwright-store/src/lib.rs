//! Layer storage, contribution engine, and touched-layer tracking for Packwright.
//!
//! This crate provides the storage layer: `LayersLayout` for the
//! `<root>/<name>/` + `<root>/<name>.toml` directory convention, `Layer` with
//! its metadata-compare-then-contribute entry point, `TouchedLayers` for
//! collecting layers that were not referenced during the current run,
//! per-layer `LayerLock`s for cross-process exclusion, and file/archive
//! utilities used by contributors.

pub mod archive;
pub mod layer;
pub mod layout;
pub mod lock;
pub mod touched;
pub mod util;

pub use archive::{extract_tar, extract_tar_gz};
pub use layer::{ContributeOutcome, Layer, LayerContentMetadata, LayerFlags, Layers};
pub use layout::{validate_layer_name, LayersLayout, PROTECTED_FILES};
pub use lock::LayerLock;
pub use touched::{CleanupReport, TouchedLayers};
pub use util::{copy_directory, copy_file, write_to_file};

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// POSIX does not guarantee a rename survives a crash until the parent
/// directory itself has been synced.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

/// Write `content` to `dest` through a temp file in the same directory.
///
/// Readers observe either the previous file or the complete new one.
pub(crate) fn write_atomic(dest: &Path, content: &[u8]) -> Result<(), StoreError> {
    let dir = dest
        .parent()
        .ok_or_else(|| StoreError::InvalidPath(dest.to_path_buf()))?;
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| StoreError::Io(e.error))?;
    fsync_dir(dir)?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode layer metadata: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid layer name: {0}")]
    InvalidLayerName(String),
    #[error("invalid path: {}", .0.display())]
    InvalidPath(PathBuf),
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
    #[error("archive entry '{entry}' escapes destination {}", .dest.display())]
    UnsafeArchiveEntry { entry: String, dest: PathBuf },
    #[error("destination directory does not exist: {}", .0.display())]
    MissingDestination(PathBuf),
}
