use crate::StoreError;
use std::fs;
use std::path::{Path, PathBuf};

/// Well-known non-layer files that share the layers root. They are never
/// reported as layers and never removed by cleanup.
pub const PROTECTED_FILES: &[&str] = &["launch.toml", "build.toml", "store.toml"];

const METADATA_EXTENSION: &str = "toml";

/// Directory layout for a layers root.
///
/// Each layer `<name>` owns a content directory `<root>/<name>/`, a metadata
/// file `<root>/<name>.toml`, and a lock file `<root>/.<name>.lock`. The
/// root itself is created lazily by the first contribution.
#[derive(Debug, Clone)]
pub struct LayersLayout {
    root: PathBuf,
}

impl LayersLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn layer_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    #[inline]
    pub fn metadata_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{METADATA_EXTENSION}"))
    }

    #[inline]
    pub fn lock_path(&self, name: &str) -> PathBuf {
        self.root.join(format!(".{name}.lock"))
    }

    pub fn is_protected(file_name: &str) -> bool {
        PROTECTED_FILES.contains(&file_name)
    }

    /// Enumerate layer metadata files currently on disk, sorted by path.
    ///
    /// Protected files, hidden files, and anything that is not a regular
    /// `*.toml` file are skipped. A missing root yields an empty list.
    pub fn list_metadata_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.starts_with('.') || Self::is_protected(&name) {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(METADATA_EXTENSION) {
                continue;
            }
            if !entry.file_type()?.is_file() {
                continue;
            }
            found.push(path);
        }
        found.sort();
        Ok(found)
    }

    /// Layer name for a metadata file path produced by [`Self::metadata_path`].
    pub fn layer_name(metadata_path: &Path) -> Option<&str> {
        metadata_path.file_stem().and_then(|s| s.to_str())
    }
}

/// Reject names that would escape the layers root or collide with the
/// protected files and lock files that live next to layers.
pub fn validate_layer_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || LayersLayout::is_protected(&format!("{name}.{METADATA_EXTENSION}"));
    if invalid {
        return Err(StoreError::InvalidLayerName(name.to_owned()));
    }
    Ok(())
}
