use packwright_remote::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the stack the build targets.
pub const STACK_ENV: &str = "CNB_STACK_ID";

/// Inputs for one [`BuildSession`](crate::BuildSession).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub layers_root: PathBuf,
    /// Directory holding `buildpack.toml`. Its `cache/` subdirectory is the
    /// read-only upstream download tier.
    #[serde(default)]
    pub buildpack_root: Option<PathBuf>,
    #[serde(default)]
    pub stack: String,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl SessionConfig {
    pub fn new(layers_root: impl Into<PathBuf>) -> Self {
        Self {
            layers_root: layers_root.into(),
            buildpack_root: None,
            stack: String::new(),
            transport: TransportConfig::default(),
        }
    }

    /// Like [`new`](Self::new), with the stack from `CNB_STACK_ID` and the
    /// transport timeout from `PACKWRIGHT_HTTP_TIMEOUT_SECS`.
    pub fn from_env(layers_root: impl Into<PathBuf>) -> Self {
        let mut config = Self::new(layers_root);
        config.stack = std::env::var(STACK_ENV).unwrap_or_default();
        config.transport = TransportConfig::from_env();
        config
    }

    #[must_use]
    pub fn with_buildpack(mut self, root: impl Into<PathBuf>) -> Self {
        self.buildpack_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn upstream_cache_root(&self) -> Option<PathBuf> {
        self.buildpack_root.as_deref().map(|root| root.join("cache"))
    }

    pub fn buildpack_root(&self) -> Option<&Path> {
        self.buildpack_root.as_deref()
    }
}
