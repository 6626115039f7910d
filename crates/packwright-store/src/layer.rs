use crate::layout::{validate_layer_name, LayersLayout};
use crate::lock::LayerLock;
use crate::touched::TouchedLayers;
use crate::{write_atomic, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Where a layer's content is made available by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerFlags {
    #[serde(default)]
    pub build: bool,
    #[serde(default)]
    pub cache: bool,
    #[serde(default)]
    pub launch: bool,
}

impl LayerFlags {
    pub const NONE: Self = Self {
        build: false,
        cache: false,
        launch: false,
    };

    pub fn build() -> Self {
        Self {
            build: true,
            ..Self::NONE
        }
    }

    pub fn cache() -> Self {
        Self {
            cache: true,
            ..Self::NONE
        }
    }

    pub fn launch() -> Self {
        Self {
            launch: true,
            ..Self::NONE
        }
    }

    #[must_use]
    pub fn with_build(mut self) -> Self {
        self.build = true;
        self
    }

    #[must_use]
    pub fn with_cache(mut self) -> Self {
        self.cache = true;
        self
    }

    #[must_use]
    pub fn with_launch(mut self) -> Self {
        self.launch = true;
        self
    }
}

/// On-disk shape of `<root>/<name>.toml`.
///
/// The flags are top-level keys and the descriptor lives in `[metadata]`.
/// Only `metadata` participates in reuse decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerContentMetadata<M> {
    #[serde(default)]
    pub build: bool,
    #[serde(default)]
    pub cache: bool,
    #[serde(default)]
    pub launch: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<M>,
}

impl<M> LayerContentMetadata<M> {
    pub fn new(flags: LayerFlags, metadata: Option<M>) -> Self {
        Self {
            build: flags.build,
            cache: flags.cache,
            launch: flags.launch,
            metadata,
        }
    }

    pub fn flags(&self) -> LayerFlags {
        LayerFlags {
            build: self.build,
            cache: self.cache,
            launch: self.launch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributeOutcome {
    /// Metadata on disk matched; the work function was not called.
    Reused,
    /// The layer was rebuilt and its metadata written.
    Contributed,
}

/// A single named layer: a content directory plus its metadata file.
#[derive(Debug, Clone)]
pub struct Layer {
    name: String,
    root: PathBuf,
    metadata_path: PathBuf,
    lock_path: PathBuf,
}

impl Layer {
    pub fn new(layout: &LayersLayout, name: &str) -> Result<Self, StoreError> {
        validate_layer_name(name)?;
        Ok(Self {
            name: name.to_owned(),
            root: layout.layer_dir(name),
            metadata_path: layout.metadata_path(name),
            lock_path: layout.lock_path(name),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Content directory. Not guaranteed to exist before a contribution.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    #[inline]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Decode the metadata file.
    ///
    /// Returns `Ok(None)` when the file is absent or cannot be decoded into
    /// `M`; corrupt or foreign metadata is a cache miss, never an error.
    /// Other I/O failures are propagated.
    pub fn read_metadata<M: DeserializeOwned>(
        &self,
    ) -> Result<Option<LayerContentMetadata<M>>, StoreError> {
        let content = match fs::read_to_string(&self.metadata_path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match toml::from_str::<LayerContentMetadata<M>>(&content) {
            Ok(decoded) => Ok(Some(decoded)),
            Err(e) => {
                debug!(
                    layer = %self.name,
                    path = %self.metadata_path.display(),
                    "ignoring undecodable layer metadata: {}",
                    e.message()
                );
                Ok(None)
            }
        }
    }

    /// Whether the metadata on disk equals `expected`.
    pub fn metadata_matches<M>(&self, expected: &M) -> Result<bool, StoreError>
    where
        M: DeserializeOwned + PartialEq,
    {
        Ok(self.stored_if_matching(expected)?.is_some())
    }

    fn stored_if_matching<M>(
        &self,
        expected: &M,
    ) -> Result<Option<LayerContentMetadata<M>>, StoreError>
    where
        M: DeserializeOwned + PartialEq,
    {
        let Some(stored) = self.read_metadata::<M>()? else {
            debug!(layer = %self.name, "no usable metadata");
            return Ok(None);
        };
        if stored.metadata.as_ref() == Some(expected) {
            Ok(Some(stored))
        } else {
            debug!(layer = %self.name, "metadata differs from expected");
            Ok(None)
        }
    }

    /// Atomically write `metadata` with `flags` to the metadata file.
    pub fn write_metadata<M: Serialize>(
        &self,
        metadata: &M,
        flags: LayerFlags,
    ) -> Result<(), StoreError> {
        let content = LayerContentMetadata::new(flags, Some(metadata));
        let text = toml::to_string(&content)?;
        write_atomic(&self.metadata_path, text.as_bytes())
    }

    pub fn remove_metadata(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.metadata_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete and recreate the content directory.
    pub fn reset_root(&self) -> Result<(), StoreError> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Run `work` only if the stored metadata differs from `expected`.
    ///
    /// On a miss the metadata file is removed, the content directory is
    /// emptied, `work` populates it, and only then is `expected` recorded.
    /// A failing `work` leaves the layer without metadata so the next run
    /// starts cold. The whole sequence holds the layer's lock; metadata is
    /// checked again once the lock is held in case another process finished
    /// the same contribution first.
    pub fn contribute<M, E, F>(
        &self,
        expected: &M,
        flags: LayerFlags,
        work: F,
    ) -> Result<ContributeOutcome, E>
    where
        M: Serialize + DeserializeOwned + PartialEq,
        E: From<StoreError>,
        F: FnOnce(&Layer) -> Result<(), E>,
    {
        if let Some(stored) = self.stored_if_matching(expected)? {
            if stored.flags() == flags {
                info!(layer = %self.name, "reusing cached layer");
                return Ok(ContributeOutcome::Reused);
            }
        }

        let _lock = LayerLock::acquire(&self.lock_path)?;
        if self.reuse(expected, flags)? {
            return Ok(ContributeOutcome::Reused);
        }

        self.remove_metadata()?;
        self.reset_root()?;

        info!(layer = %self.name, "contributing layer");
        work(self)?;

        self.write_metadata(expected, flags)?;
        debug!(layer = %self.name, path = %self.metadata_path.display(), "wrote layer metadata");
        Ok(ContributeOutcome::Contributed)
    }

    /// Must be called with the layer lock held, since it may rewrite the
    /// metadata file.
    fn reuse<M>(&self, expected: &M, flags: LayerFlags) -> Result<bool, StoreError>
    where
        M: Serialize + DeserializeOwned + PartialEq,
    {
        let Some(stored) = self.stored_if_matching(expected)? else {
            return Ok(false);
        };
        info!(layer = %self.name, "reusing cached layer");
        if stored.flags() != flags {
            self.write_metadata(expected, flags)?;
        }
        Ok(true)
    }
}

/// A layers root whose layer accesses are recorded in a [`TouchedLayers`].
#[derive(Debug, Clone)]
pub struct Layers {
    layout: LayersLayout,
    touched: Arc<TouchedLayers>,
}

impl Layers {
    /// Start tracking a layers root with an empty touched set.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let layout = LayersLayout::new(root);
        let touched = Arc::new(TouchedLayers::new(layout.clone()));
        Self { layout, touched }
    }

    pub fn with_tracker(layout: LayersLayout, touched: Arc<TouchedLayers>) -> Self {
        Self { layout, touched }
    }

    #[inline]
    pub fn layout(&self) -> &LayersLayout {
        &self.layout
    }

    #[inline]
    pub fn touched(&self) -> &Arc<TouchedLayers> {
        &self.touched
    }

    /// Return the layer `name`, marking it touched.
    pub fn layer(&self, name: &str) -> Result<Layer, StoreError> {
        let layer = Layer::new(&self.layout, name)?;
        self.touched.add(layer.metadata_path());
        Ok(layer)
    }
}
