//! Dependency catalog model and resolution for Packwright.
//!
//! This crate defines the schema layer: dependency descriptors (`Dependency`)
//! with their structural validation, the lenient `Version` type and the
//! `VersionConstraint` grammar, catalog resolution (`Dependencies::best`), and
//! decoding of a buildpack's `buildpack.toml` (`BuildpackDescriptor`).

pub mod buildpack;
pub mod dependencies;
pub mod dependency;
pub mod types;
pub mod version;

pub use buildpack::{BuildpackDescriptor, BuildpackInfo, StackEntry, DESCRIPTOR_FILE};
pub use dependencies::Dependencies;
pub use dependency::{Dependency, License, Licenses, Stacks};
pub use types::{Checksum, DependencyId};
pub use version::{Version, VersionConstraint};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("no valid dependencies for {id}, {constraint}, and {stack} in {candidates}")]
    NoValidDependencies {
        id: String,
        constraint: String,
        stack: String,
        candidates: String,
    },
    #[error("invalid version '{0}'")]
    InvalidVersion(String),
    #[error("invalid version constraint '{0}'")]
    InvalidConstraint(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("dependencies have invalid structure: {0}")]
    InvalidDependencies(String),
    #[error("failed to read buildpack descriptor: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse buildpack descriptor: {0}")]
    ParseToml(#[from] toml::de::Error),
}
