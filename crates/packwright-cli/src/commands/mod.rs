pub mod fetch;
pub mod gc;
pub mod resolve;

use packwright_core::{BuildSession, CoreError, ErrorKind, SessionConfig};
use packwright_schema::Dependency;
use serde::Serialize;
use std::fmt;
use std::path::Path;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_RESOLUTION_ERROR: u8 = 2;
pub const EXIT_VALIDATION_ERROR: u8 = 3;
pub const EXIT_TRANSPORT_ERROR: u8 = 4;
pub const EXIT_INTEGRITY_ERROR: u8 = 5;
pub const EXIT_STORE_ERROR: u8 = 6;
pub const EXIT_CANCELLED: u8 = 130;

pub fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Resolution => EXIT_RESOLUTION_ERROR,
        ErrorKind::Validation => EXIT_VALIDATION_ERROR,
        ErrorKind::Transport => EXIT_TRANSPORT_ERROR,
        ErrorKind::Integrity => EXIT_INTEGRITY_ERROR,
        ErrorKind::Contribution | ErrorKind::Io => EXIT_STORE_ERROR,
        ErrorKind::Cancelled => EXIT_CANCELLED,
    }
}

/// A failed command: the message for stderr and the process exit code.
#[derive(Debug)]
pub struct CommandError {
    pub message: String,
    pub code: u8,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<CoreError> for CommandError {
    fn from(e: CoreError) -> Self {
        let kind = e.kind();
        Self {
            message: format!("{kind} error: {e}"),
            code: exit_code(kind),
        }
    }
}

impl From<String> for CommandError {
    fn from(message: String) -> Self {
        Self {
            message,
            code: EXIT_FAILURE,
        }
    }
}

pub fn json_pretty(value: &impl Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

/// Open a session on `layers` for the buildpack at `buildpack`, with the
/// stack taken from `stack` or else `CNB_STACK_ID`.
pub fn open_session(
    layers: &Path,
    buildpack: Option<&Path>,
    stack: Option<&str>,
) -> Result<BuildSession, CoreError> {
    let mut config = SessionConfig::from_env(layers);
    if let Some(root) = buildpack {
        config = config.with_buildpack(root);
    }
    if let Some(stack) = stack {
        config = config.with_stack(stack);
    }
    if config.buildpack_root.is_some() && config.stack.is_empty() {
        return Err(CoreError::Config(
            "no stack given; pass --stack or set CNB_STACK_ID".to_owned(),
        ));
    }
    BuildSession::from_config(config)
}

/// JSON view of a catalog entry.
#[derive(Debug, Serialize)]
pub struct DependencySummary<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub version: String,
    pub uri: &'a str,
    pub sha256: &'a str,
    pub stacks: Vec<&'a str>,
}

impl<'a> From<&'a Dependency> for DependencySummary<'a> {
    fn from(d: &'a Dependency) -> Self {
        Self {
            id: &d.id,
            name: &d.name,
            version: d.version.to_string(),
            uri: &d.uri,
            sha256: &d.sha256,
            stacks: d.stacks.iter().collect(),
        }
    }
}
