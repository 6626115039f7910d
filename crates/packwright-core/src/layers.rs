//! Typed layers built on [`Layer::contribute`].
//!
//! Each type pairs a store [`Layer`] with the descriptor that decides reuse
//! and the session it reports to. Contributor failures come back as
//! [`CoreError::Contribution`] naming the layer; download and verification
//! failures keep their own error kind.

use crate::session::BuildSession;
use crate::CoreError;
use packwright_schema::Dependency;
use packwright_store::{copy_file, ContributeOutcome, Layer, LayerFlags};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A contributor receives the verified artifact path and the layer to
/// populate.
pub type Contributor<'a> = Box<dyn FnOnce(&Path, &Layer) -> Result<(), CoreError> + 'a>;

/// A layer named after a dependency's id holding that dependency's
/// expanded contents.
pub struct DependencyLayer<'s> {
    session: &'s BuildSession,
    layer: Layer,
    dependency: Dependency,
}

impl<'s> DependencyLayer<'s> {
    pub(crate) fn new(session: &'s BuildSession, dependency: Dependency) -> Result<Self, CoreError> {
        let layer = session.layer(&dependency.id)?;
        // the artifact's download layer belongs to this run even when the
        // expanded layer is reused and nothing is fetched
        session.layer(&dependency.sha256)?;
        Ok(Self {
            session,
            layer,
            dependency,
        })
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    /// Populate the layer unless its metadata already records this
    /// dependency. On a miss the artifact is obtained first and handed to
    /// `contributor`. Either way the dependency enters the build plan.
    pub fn contribute<F>(&self, flags: LayerFlags, contributor: F) -> Result<ContributeOutcome, CoreError>
    where
        F: FnOnce(&Path, &Layer) -> Result<(), CoreError>,
    {
        let outcome = self
            .layer
            .contribute::<_, CoreError, _>(&self.dependency, flags, |layer: &Layer| {
                let artifact = self.session.artifact(&self.dependency)?;
                info!(
                    layer = layer.name(),
                    dependency = %self.dependency,
                    "contributing dependency"
                );
                contributor(&artifact, layer)
                    .map_err(|e| CoreError::contribution(layer.name(), e))
            })?;
        self.session.record(&self.dependency);
        Ok(outcome)
    }
}

/// A layer named after a dependency's SHA-256 holding just its artifact.
pub struct DownloadLayer<'s> {
    session: &'s BuildSession,
    dependency: Dependency,
}

impl<'s> DownloadLayer<'s> {
    pub(crate) fn new(session: &'s BuildSession, dependency: Dependency) -> Result<Self, CoreError> {
        session.layer(&dependency.sha256)?;
        Ok(Self {
            session,
            dependency,
        })
    }

    pub fn name(&self) -> &str {
        &self.dependency.sha256
    }

    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    /// Path to the verified artifact, checking the buildpack's bundled cache
    /// before the layers root and downloading only when neither matches.
    pub fn artifact(&self) -> Result<PathBuf, CoreError> {
        self.session.artifact(&self.dependency)
    }
}

/// Metadata of a [`MultiDependencyLayer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiDependencyMetadata {
    pub dependencies: Vec<Dependency>,
}

/// One layer carrying several dependencies, reused only while the whole
/// set is unchanged.
pub struct MultiDependencyLayer<'s> {
    session: &'s BuildSession,
    layer: Layer,
    metadata: MultiDependencyMetadata,
}

impl<'s> MultiDependencyLayer<'s> {
    pub(crate) fn new(
        session: &'s BuildSession,
        name: &str,
        dependencies: Vec<Dependency>,
    ) -> Result<Self, CoreError> {
        let layer = session.layer(name)?;
        for dependency in &dependencies {
            session.layer(&dependency.sha256)?;
        }
        Ok(Self {
            session,
            layer,
            metadata: MultiDependencyMetadata { dependencies },
        })
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.metadata.dependencies
    }

    /// Contribute every dependency with the contributor registered under its
    /// id. All contributors must be present before any work starts.
    pub fn contribute(
        &self,
        flags: LayerFlags,
        mut contributors: HashMap<String, Contributor<'_>>,
    ) -> Result<ContributeOutcome, CoreError> {
        for dependency in &self.metadata.dependencies {
            if !contributors.contains_key(dependency.id.as_str()) {
                return Err(CoreError::MissingContributor {
                    layer: self.layer.name().to_owned(),
                    id: dependency.id.to_string(),
                });
            }
        }

        let outcome = self
            .layer
            .contribute::<_, CoreError, _>(&self.metadata, flags, |layer: &Layer| {
                for dependency in &self.metadata.dependencies {
                    let contributor = contributors.remove(dependency.id.as_str()).ok_or_else(|| {
                        CoreError::MissingContributor {
                            layer: layer.name().to_owned(),
                            id: dependency.id.to_string(),
                        }
                    })?;
                    let artifact = self.session.artifact(dependency)?;
                    debug!(layer = layer.name(), dependency = %dependency, "contributing dependency");
                    contributor(&artifact, layer)
                        .map_err(|e| CoreError::contribution(layer.name(), e))?;
                }
                Ok(())
            })?;

        for dependency in &self.metadata.dependencies {
            self.session.record(dependency);
        }
        Ok(outcome)
    }
}

/// Metadata of a [`HelperLayer`]: the buildpack identity and a display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperMetadata {
    pub id: String,
    pub name: String,
    pub version: String,
    pub display_name: String,
}

/// A layer installing one of the buildpack's own `bin/` executables.
pub struct HelperLayer<'s> {
    session: &'s BuildSession,
    layer: Layer,
    helper: String,
    metadata: HelperMetadata,
}

impl<'s> HelperLayer<'s> {
    pub(crate) fn new(session: &'s BuildSession, id: &str, display_name: &str) -> Result<Self, CoreError> {
        let info = session
            .buildpack()
            .map(|bp| bp.buildpack.clone())
            .ok_or(CoreError::MissingBuildpack)?;
        let layer = session.layer(id)?;
        Ok(Self {
            session,
            layer,
            helper: id.to_owned(),
            metadata: HelperMetadata {
                id: info.id,
                name: info.name,
                version: info.version,
                display_name: display_name.to_owned(),
            },
        })
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn metadata(&self) -> &HelperMetadata {
        &self.metadata
    }

    /// Copy `<buildpack>/bin/<id>` to `<layer>/bin/<id>`, keeping its mode.
    pub fn contribute(&self, flags: LayerFlags) -> Result<ContributeOutcome, CoreError> {
        let source = self.session.buildpack_root()?.join("bin").join(&self.helper);
        self.layer.contribute(&self.metadata, flags, |layer: &Layer| {
            info!(layer = layer.name(), helper = %self.metadata.display_name, "installing helper");
            let dest = layer.root().join("bin").join(&self.helper);
            copy_file(&source, &dest)
                .map(|_| ())
                .map_err(|e| CoreError::contribution(layer.name(), e.into()))
        })
    }
}
