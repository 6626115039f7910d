use crate::{RemoteError, Transport};
use packwright_schema::Dependency;
use packwright_store::{Layer, LayerFlags, Layers, LayersLayout};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info};

const CHUNK_SIZE: usize = 64 * 1024;
const ARTIFACT_MODE: u32 = 0o644;

type CancelFn = dyn Fn() -> bool + Send + Sync;

/// Content-addressed download cache keyed by a dependency's SHA-256.
///
/// Lookup order for [`artifact`](Self::artifact):
/// 1. the read-only upstream tier (typically `<buildpack>/cache`), used only
///    when its `<sha256>.toml` equals the requested dependency;
/// 2. the local tier, a layers root whose `<sha256>` layer is reused when its
///    metadata matches;
/// 3. a fresh download into the local tier, verified while streaming.
///
/// Artifacts live at `<root>/<sha256>/<artifact name>` in both tiers.
pub struct DownloadCache {
    local: Layers,
    upstream: Option<LayersLayout>,
    transport: Arc<dyn Transport>,
    cancel: Option<Arc<CancelFn>>,
}

impl DownloadCache {
    pub fn new(local: Layers, upstream: Option<LayersLayout>, transport: Arc<dyn Transport>) -> Self {
        Self {
            local,
            upstream,
            transport,
            cancel: None,
        }
    }

    /// Abort in-flight downloads once `should_stop` returns true. It is
    /// polled between body chunks.
    #[must_use]
    pub fn with_cancel(mut self, should_stop: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.cancel = Some(Arc::new(should_stop));
        self
    }

    pub fn local(&self) -> &Layers {
        &self.local
    }

    pub fn upstream(&self) -> Option<&LayersLayout> {
        self.upstream.as_ref()
    }

    /// Path to `dependency`'s artifact, downloading and verifying it only if
    /// neither tier already holds a matching copy.
    pub fn artifact(&self, dependency: &Dependency) -> Result<PathBuf, RemoteError> {
        let key = dependency.sha256.as_str();

        if let Some(path) = self.upstream_artifact(dependency)? {
            info!(checksum = key, "reusing cached download from buildpack");
            return Ok(path);
        }

        let layer = self.local.layer(key)?;
        let artifact = layer.root().join(dependency.artifact_name());
        if !artifact.is_file() {
            // metadata without its artifact must not count as a hit
            layer.remove_metadata()?;
        }

        layer.contribute(
            dependency,
            LayerFlags::build().with_cache(),
            |layer: &Layer| self.download(dependency, &layer.root().join(dependency.artifact_name())),
        )?;
        Ok(artifact)
    }

    fn upstream_artifact(&self, dependency: &Dependency) -> Result<Option<PathBuf>, RemoteError> {
        let Some(upstream) = &self.upstream else {
            return Ok(None);
        };
        let layer = Layer::new(upstream, dependency.sha256.as_str())?;
        if !layer.metadata_matches(dependency)? {
            return Ok(None);
        }
        let path = layer.root().join(dependency.artifact_name());
        if path.is_file() {
            Ok(Some(path))
        } else {
            debug!(path = %path.display(), "upstream metadata present but artifact missing");
            Ok(None)
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|f| f())
    }

    /// Stream the artifact into a temp file beside `dest`, hashing as it
    /// goes, and rename it into place only if the digest matches.
    fn download(&self, dependency: &Dependency, dest: &Path) -> Result<(), RemoteError> {
        let uri = dependency.uri.as_str();
        info!(uri, "downloading");
        if self.cancelled() {
            return Err(RemoteError::Cancelled);
        }

        let mut body = self.transport.fetch(uri)?;
        let dir = dest
            .parent()
            .ok_or_else(|| RemoteError::UnsupportedUri(uri.to_owned()))?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total: u64 = 0;

        loop {
            if self.cancelled() {
                return Err(RemoteError::Cancelled);
            }
            let n = match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(RemoteError::Network {
                        uri: uri.to_owned(),
                        message: e.to_string(),
                    });
                }
            };
            hasher.update(&buf[..n]);
            tmp.write_all(&buf[..n])?;
            total += n as u64;
        }

        debug!(uri, bytes = total, "verifying checksum");
        let actual = hex::encode(hasher.finalize());
        if !dependency.sha256.matches_hex(&actual) {
            return Err(RemoteError::IntegrityFailure {
                uri: uri.to_owned(),
                expected: dependency.sha256.to_string(),
                actual,
            });
        }

        tmp.as_file().sync_all()?;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(ARTIFACT_MODE))?;
        tmp.persist(dest).map_err(|e| RemoteError::Io(e.error))?;
        Ok(())
    }
}
