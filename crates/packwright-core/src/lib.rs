//! Build session orchestration for Packwright.
//!
//! This crate ties together catalog resolution, the download cache, and layer
//! contribution into a `BuildSession`: the explicit per-invocation context
//! that owns the touched-layer tracker, the stack id, and the build plan. It
//! also provides the typed layers buildpacks contribute through
//! (`DependencyLayer`, `DownloadLayer`, `MultiDependencyLayer`,
//! `HelperLayer`), the `ErrorKind` taxonomy surfaced to the CLI, and
//! Ctrl-C driven cancellation.

pub mod concurrency;
pub mod config;
pub mod layers;
pub mod plan;
pub mod session;

pub use concurrency::{ensure_not_cancelled, install_signal_handler, shutdown_requested};
pub use config::SessionConfig;
pub use layers::{
    Contributor, DependencyLayer, DownloadLayer, HelperLayer, HelperMetadata,
    MultiDependencyLayer, MultiDependencyMetadata,
};
pub use plan::{BuildPlan, BuildPlanEntry};
pub use session::BuildSession;

use packwright_remote::RemoteError;
use packwright_schema::SchemaError;
use packwright_store::StoreError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("contribution to layer '{layer}' failed: {source}")]
    Contribution {
        layer: String,
        #[source]
        source: Box<CoreError>,
    },
    #[error("layer '{layer}' has no contributor for dependency '{id}'")]
    MissingContributor { layer: String, id: String },
    #[error("no buildpack root configured")]
    MissingBuildpack,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("operation cancelled")]
    Cancelled,
}

/// Coarse failure class, used by the CLI to pick an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No catalog entry satisfies the query.
    Resolution,
    /// A descriptor, constraint, name or configuration is malformed.
    Validation,
    /// The artifact could not be fetched.
    Transport,
    /// Fetched bytes did not hash to the expected checksum.
    Integrity,
    /// A contributor failed while populating a layer.
    Contribution,
    /// Filesystem failure outside a contributor.
    Io,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Resolution => "resolution",
            Self::Validation => "validation",
            Self::Transport => "transport",
            Self::Integrity => "integrity",
            Self::Contribution => "contribution",
            Self::Io => "io",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

fn schema_kind(e: &SchemaError) -> ErrorKind {
    match e {
        SchemaError::NoValidDependencies { .. } => ErrorKind::Resolution,
        SchemaError::Io(_) => ErrorKind::Io,
        SchemaError::InvalidVersion(_)
        | SchemaError::InvalidConstraint(_)
        | SchemaError::Validation(_)
        | SchemaError::InvalidDependencies(_)
        | SchemaError::ParseToml(_) => ErrorKind::Validation,
    }
}

fn store_kind(e: &StoreError) -> ErrorKind {
    match e {
        StoreError::InvalidLayerName(_) => ErrorKind::Validation,
        _ => ErrorKind::Io,
    }
}

fn remote_kind(e: &RemoteError) -> ErrorKind {
    match e {
        RemoteError::Http { .. } | RemoteError::Network { .. } | RemoteError::UnsupportedUri(_) => {
            ErrorKind::Transport
        }
        RemoteError::IntegrityFailure { .. } => ErrorKind::Integrity,
        RemoteError::Cancelled => ErrorKind::Cancelled,
        RemoteError::Store(s) => store_kind(s),
        RemoteError::Io(_) => ErrorKind::Io,
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema(e) => schema_kind(e),
            Self::Store(e) => store_kind(e),
            Self::Remote(e) => remote_kind(e),
            // a contributor that itself failed to fetch or verify keeps that
            // classification
            Self::Contribution { source, .. } => match source.kind() {
                k @ (ErrorKind::Cancelled
                | ErrorKind::Transport
                | ErrorKind::Integrity
                | ErrorKind::Resolution) => k,
                _ => ErrorKind::Contribution,
            },
            Self::MissingContributor { .. } | Self::MissingBuildpack | Self::Config(_) => {
                ErrorKind::Validation
            }
            Self::Io(_) => ErrorKind::Io,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn contribution(layer: &str, source: CoreError) -> Self {
        Self::Contribution {
            layer: layer.to_owned(),
            source: Box::new(source),
        }
    }
}
