use crate::layout::LayersLayout;
use crate::lock::LayerLock;
use crate::StoreError;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Layers referenced during the current invocation.
///
/// Created empty per run, filled by every layer access, and consumed once by
/// [`cleanup`](Self::cleanup) which removes every on-disk layer that was not
/// touched.
#[derive(Debug)]
pub struct TouchedLayers {
    layout: LayersLayout,
    touched: Mutex<HashSet<PathBuf>>,
}

#[derive(Debug, Default, Serialize)]
pub struct CleanupReport {
    /// Names of layers that were not touched during this run.
    pub untouched: Vec<String>,
    pub removed: usize,
}

impl TouchedLayers {
    pub fn new(layout: LayersLayout) -> Self {
        Self {
            layout,
            touched: Mutex::new(HashSet::new()),
        }
    }

    #[inline]
    pub fn layout(&self) -> &LayersLayout {
        &self.layout
    }

    /// Record a layer's metadata path as touched.
    pub fn add(&self, metadata_path: &Path) {
        debug!(path = %metadata_path.display(), "layer touched");
        self.lock_set().insert(metadata_path.to_path_buf());
    }

    pub fn contains(&self, metadata_path: &Path) -> bool {
        self.lock_set().contains(metadata_path)
    }

    pub fn len(&self) -> usize {
        self.lock_set().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_set().is_empty()
    }

    fn lock_set(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        // the set has no invariants a panicking holder could break
        self.touched
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Remove every untouched layer's metadata file, content directory and
    /// lock file.
    pub fn cleanup(&self) -> Result<CleanupReport, StoreError> {
        self.cleanup_with_cancel(false, || false)
    }

    /// Like [`cleanup`](Self::cleanup), optionally reporting without
    /// deleting. `should_stop` is polled between removals.
    pub fn cleanup_with_cancel(
        &self,
        dry_run: bool,
        should_stop: impl Fn() -> bool,
    ) -> Result<CleanupReport, StoreError> {
        let candidates = self.layout.list_metadata_files()?;
        let untouched: Vec<PathBuf> = {
            let touched = self.lock_set();
            debug!(
                existing = candidates.len(),
                touched = touched.len(),
                "computing untouched layers"
            );
            candidates
                .into_iter()
                .filter(|c| !touched.contains(c))
                .collect()
        };

        let mut report = CleanupReport {
            untouched: untouched
                .iter()
                .filter_map(|p| LayersLayout::layer_name(p).map(str::to_owned))
                .collect(),
            removed: 0,
        };

        if dry_run || untouched.is_empty() {
            return Ok(report);
        }

        info!("removing {} unused layer(s)", untouched.len());
        for metadata_path in &untouched {
            if should_stop() {
                break;
            }
            let Some(name) = LayersLayout::layer_name(metadata_path) else {
                continue;
            };
            info!(layer = name, "removing unused layer");
            remove_if_exists(metadata_path, false)?;
            remove_if_exists(&self.layout.layer_dir(name), true)?;
            remove_lock_file(&self.layout.lock_path(name))?;
            report.removed += 1;
        }
        Ok(report)
    }
}

/// Unlink a layer's lock file unless another process holds it; a holder
/// must keep locking the same inode its peers will open.
fn remove_lock_file(lock_path: &Path) -> Result<(), StoreError> {
    if !lock_path.exists() {
        return Ok(());
    }
    match LayerLock::try_acquire(lock_path)? {
        Some(_lock) => remove_if_exists(lock_path, false),
        None => {
            debug!(path = %lock_path.display(), "lock file in use, leaving it");
            Ok(())
        }
    }
}

fn remove_if_exists(path: &Path, dir: bool) -> Result<(), StoreError> {
    let result = if dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
