use crate::dependencies::Dependencies;
use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DESCRIPTOR_FILE: &str = "buildpack.toml";

/// Identity block of `buildpack.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildpackInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mixins: Vec<String>,
}

/// Decoded `buildpack.toml`.
///
/// `[metadata]` is kept as a raw TOML table; the typed views
/// ([`Self::dependencies`], [`Self::include_files`], [`Self::pre_package`])
/// decode it on demand and report shape errors instead of panicking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildpackDescriptor {
    pub buildpack: BuildpackInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stacks: Vec<StackEntry>,
    #[serde(default)]
    pub metadata: toml::Table,
}

impl BuildpackDescriptor {
    pub fn parse(content: &str) -> Result<Self, SchemaError> {
        let descriptor: Self = toml::from_str(content)?;
        if descriptor.buildpack.id.trim().is_empty() {
            return Err(SchemaError::Validation(
                "buildpack.id must not be empty".to_owned(),
            ));
        }
        Ok(descriptor)
    }

    /// Read `<root>/buildpack.toml`.
    pub fn from_dir(root: &Path) -> Result<Self, SchemaError> {
        Self::from_file(&root.join(DESCRIPTOR_FILE))
    }

    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn dependencies(&self) -> Result<Dependencies, SchemaError> {
        Dependencies::from_metadata(&self.metadata)
    }

    pub fn include_files(&self) -> Result<Vec<String>, SchemaError> {
        let Some(value) = self.metadata.get("include_files") else {
            return Ok(Vec::new());
        };
        let invalid =
            || SchemaError::Validation("include_files is not an array of strings".to_owned());
        value
            .as_array()
            .ok_or_else(invalid)?
            .iter()
            .map(|v| v.as_str().map(str::to_owned).ok_or_else(invalid))
            .collect()
    }

    pub fn pre_package(&self) -> Option<&str> {
        self.metadata.get("pre_package").and_then(toml::Value::as_str)
    }

    pub fn supports_stack(&self, stack: &str) -> bool {
        self.stacks.iter().any(|s| s.id == stack)
    }
}
