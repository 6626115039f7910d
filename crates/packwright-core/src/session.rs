use crate::concurrency::{ensure_not_cancelled, shutdown_requested};
use crate::config::SessionConfig;
use crate::layers::{DependencyLayer, DownloadLayer, HelperLayer, MultiDependencyLayer};
use crate::plan::BuildPlan;
use crate::CoreError;
use packwright_remote::{DefaultTransport, DownloadCache, Transport};
use packwright_schema::{BuildpackDescriptor, Dependencies, Dependency};
use packwright_store::{CleanupReport, Layer, Layers, LayersLayout, TouchedLayers};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Everything one buildpack invocation shares: the layers root and its
/// touched-layer tracker, the download cache, the dependency catalog, the
/// target stack and the build plan being assembled.
///
/// Sessions hold no global state, so several can coexist in one process
/// against different layers roots.
pub struct BuildSession {
    config: SessionConfig,
    layers: Layers,
    cache: DownloadCache,
    buildpack: Option<BuildpackDescriptor>,
    catalog: Dependencies,
    plan: Mutex<BuildPlan>,
}

impl BuildSession {
    /// Open a session, loading `buildpack.toml` from the configured
    /// buildpack root if there is one.
    pub fn new(config: SessionConfig, transport: Arc<dyn Transport>) -> Result<Self, CoreError> {
        let (buildpack, catalog) = match config.buildpack_root() {
            Some(root) => {
                let descriptor = BuildpackDescriptor::from_dir(root)?;
                let catalog = descriptor.dependencies()?;
                debug!(
                    buildpack = %descriptor.buildpack.id,
                    dependencies = catalog.len(),
                    "loaded buildpack descriptor"
                );
                (Some(descriptor), catalog)
            }
            None => (None, Dependencies::default()),
        };

        let layers = Layers::new(&config.layers_root);
        let upstream = config.upstream_cache_root().map(LayersLayout::new);
        let cache =
            DownloadCache::new(layers.clone(), upstream, transport).with_cancel(shutdown_requested);

        Ok(Self {
            config,
            layers,
            cache,
            buildpack,
            catalog,
            plan: Mutex::new(BuildPlan::new()),
        })
    }

    /// [`new`](Self::new) with the HTTP/file transport built from the
    /// session's transport settings.
    pub fn from_config(config: SessionConfig) -> Result<Self, CoreError> {
        let transport = Arc::new(DefaultTransport::new(config.transport.clone()));
        Self::new(config, transport)
    }

    /// Replace the catalog, e.g. when dependencies come from somewhere other
    /// than `buildpack.toml`.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Dependencies) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stack(&self) -> &str {
        &self.config.stack
    }

    pub fn buildpack(&self) -> Option<&BuildpackDescriptor> {
        self.buildpack.as_ref()
    }

    pub fn catalog(&self) -> &Dependencies {
        &self.catalog
    }

    pub fn layers(&self) -> &Layers {
        &self.layers
    }

    pub fn touched(&self) -> &Arc<TouchedLayers> {
        self.layers.touched()
    }

    pub(crate) fn buildpack_root(&self) -> Result<PathBuf, CoreError> {
        self.config
            .buildpack_root()
            .map(PathBuf::from)
            .ok_or(CoreError::MissingBuildpack)
    }

    /// Best catalog entry for `id` and `constraint` on the session's stack.
    pub fn resolve(&self, id: &str, constraint: &str) -> Result<Dependency, CoreError> {
        let dependency = self.catalog.best(id, constraint, &self.config.stack)?;
        debug!(id, constraint, version = %dependency.version, "resolved dependency");
        Ok(dependency)
    }

    /// The layer `name`, marked touched.
    pub fn layer(&self, name: &str) -> Result<Layer, CoreError> {
        Ok(self.layers.layer(name)?)
    }

    /// Local path to `dependency`'s verified artifact.
    pub fn artifact(&self, dependency: &Dependency) -> Result<PathBuf, CoreError> {
        ensure_not_cancelled()?;
        Ok(self.cache.artifact(dependency)?)
    }

    pub fn dependency_layer(&self, dependency: Dependency) -> Result<DependencyLayer<'_>, CoreError> {
        DependencyLayer::new(self, dependency)
    }

    pub fn download_layer(&self, dependency: Dependency) -> Result<DownloadLayer<'_>, CoreError> {
        DownloadLayer::new(self, dependency)
    }

    pub fn multi_dependency_layer(
        &self,
        name: &str,
        dependencies: Vec<Dependency>,
    ) -> Result<MultiDependencyLayer<'_>, CoreError> {
        MultiDependencyLayer::new(self, name, dependencies)
    }

    pub fn helper_layer(&self, id: &str, display_name: &str) -> Result<HelperLayer<'_>, CoreError> {
        HelperLayer::new(self, id, display_name)
    }

    pub(crate) fn record(&self, dependency: &Dependency) {
        self.lock_plan().add(dependency);
    }

    /// Snapshot of the dependencies contributed so far.
    pub fn build_plan(&self) -> BuildPlan {
        self.lock_plan().clone()
    }

    fn lock_plan(&self) -> MutexGuard<'_, BuildPlan> {
        self.plan.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove every layer this session did not touch.
    pub fn finish(&self) -> Result<CleanupReport, CoreError> {
        self.finish_with(false)
    }

    /// Like [`finish`](Self::finish); with `dry_run` the untouched layers are
    /// only reported.
    pub fn finish_with(&self, dry_run: bool) -> Result<CleanupReport, CoreError> {
        let report = self
            .touched()
            .cleanup_with_cancel(dry_run, shutdown_requested)?;
        if shutdown_requested() && report.removed < report.untouched.len() && !dry_run {
            return Err(CoreError::Cancelled);
        }
        info!(
            untouched = report.untouched.len(),
            removed = report.removed,
            "layer cleanup finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use packwright_remote::RemoteError;
    use std::fs;
    use std::io::Read;

    struct NoNetwork;

    impl Transport for NoNetwork {
        fn fetch(&self, uri: &str) -> Result<Box<dyn Read>, RemoteError> {
            Err(RemoteError::Network {
                uri: uri.to_owned(),
                message: "offline".to_owned(),
            })
        }
    }

    const BUILDPACK_TOML: &str = r#"
[buildpack]
id = "example/java"
name = "Java"
version = "1.2.3"

[[stacks]]
id = "s"

[[metadata.dependencies]]
id = "jdk"
name = "JDK"
version = "11.0.2"
uri = "https://example.com/jdk-11.0.2.tgz"
sha256 = "0000000000000000000000000000000000000000000000000000000000000000"
stacks = ["s"]

[[metadata.dependencies]]
id = "jdk"
name = "JDK"
version = "11.0.10"
uri = "https://example.com/jdk-11.0.10.tgz"
sha256 = "1111111111111111111111111111111111111111111111111111111111111111"
stacks = ["s"]

[[metadata.dependencies]]
id = "jdk"
name = "JDK"
version = "17.0.1"
uri = "https://example.com/jdk-17.0.1.tgz"
sha256 = "2222222222222222222222222222222222222222222222222222222222222222"
stacks = ["other"]
"#;

    fn session(dir: &std::path::Path, stack: &str) -> BuildSession {
        let bp = dir.join("bp");
        fs::create_dir_all(&bp).unwrap();
        fs::write(bp.join("buildpack.toml"), BUILDPACK_TOML).unwrap();
        let config = SessionConfig::new(dir.join("layers"))
            .with_buildpack(&bp)
            .with_stack(stack);
        BuildSession::new(config, Arc::new(NoNetwork)).unwrap()
    }

    #[test]
    fn resolves_from_buildpack_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path(), "s");
        assert_eq!(session.catalog().len(), 3);
        assert_eq!(session.buildpack().unwrap().buildpack.id, "example/java");

        let jdk = session.resolve("jdk", "11.*").unwrap();
        assert_eq!(jdk.version.to_string(), "11.0.10");
        let any = session.resolve("jdk", "").unwrap();
        assert_eq!(any.version.to_string(), "11.0.10");
    }

    #[test]
    fn resolution_failure_is_resolution_kind() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path(), "s");
        let err = session.resolve("jdk", "17.*").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);
        assert!(err.to_string().contains("no valid dependencies for jdk, 17.*, and s"));
    }

    #[test]
    fn missing_descriptor_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::new(dir.path().join("layers")).with_buildpack(dir.path());
        let Err(err) = BuildSession::new(config, Arc::new(NoNetwork)) else {
            panic!("expected an error");
        };
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn sessions_do_not_share_touched_state() {
        let dir = tempfile::tempdir().unwrap();
        let a = session(&dir.path().join("a"), "s");
        let b = session(&dir.path().join("b"), "s");
        a.layer("one").unwrap();
        assert_eq!(a.touched().len(), 1);
        assert!(b.touched().is_empty());
    }

    #[test]
    fn finish_removes_untouched_layers() {
        let dir = tempfile::tempdir().unwrap();
        let layers = dir.path().join("layers");
        fs::create_dir_all(layers.join("stale")).unwrap();
        fs::write(layers.join("stale.toml"), "build = true\n").unwrap();
        fs::write(layers.join("launch.toml"), "").unwrap();

        let session = session(dir.path(), "s");
        let kept = session.layer("kept").unwrap();
        kept.write_metadata(&"v1".to_owned(), packwright_store::LayerFlags::build())
            .unwrap();

        let preview = session.finish_with(true).unwrap();
        assert_eq!(preview.untouched, ["stale"]);
        assert_eq!(preview.removed, 0);
        assert!(layers.join("stale.toml").exists());

        let report = session.finish().unwrap();
        assert_eq!(report.removed, 1);
        assert!(!layers.join("stale.toml").exists());
        assert!(!layers.join("stale").exists());
        assert!(layers.join("kept.toml").exists());
        assert!(layers.join("launch.toml").exists());
    }

    #[test]
    fn session_without_buildpack_has_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let session =
            BuildSession::new(SessionConfig::new(dir.path()), Arc::new(NoNetwork)).unwrap();
        assert!(session.catalog().is_empty());
        assert!(session.buildpack().is_none());
        assert_eq!(
            session.helper_layer("helper", "Helper").err().map(|e| e.kind()),
            Some(ErrorKind::Validation)
        );
    }
}
