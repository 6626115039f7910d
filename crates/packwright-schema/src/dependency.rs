use crate::types::{Checksum, DependencyId};
use crate::version::Version;
use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stack identifiers a dependency artifact is built for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stacks(Vec<String>);

impl Stacks {
    pub fn new<I, S>(stacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(stacks.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, stack: &str) -> bool {
        self.0.iter().any(|s| s == stack)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.0.is_empty() {
            return Err(SchemaError::Validation(
                "at least one stack is required".to_owned(),
            ));
        }
        if self.0.iter().any(|s| s.trim().is_empty()) {
            return Err(SchemaError::Validation(
                "stack identifiers must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Stacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,
}

impl License {
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.kind.is_empty() && self.uri.is_empty() {
            return Err(SchemaError::Validation(
                "license must specify a type or a uri".to_owned(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Licenses(Vec<License>);

impl Licenses {
    pub fn new(licenses: Vec<License>) -> Self {
        Self(licenses)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, License> {
        self.0.iter()
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.0.is_empty() {
            return Err(SchemaError::Validation(
                "at least one license is required".to_owned(),
            ));
        }
        self.0.iter().try_for_each(License::validate)
    }
}

/// One obtainable artifact in a buildpack's dependency catalog.
///
/// Field names follow the `[[metadata.dependencies]]` tables of
/// `buildpack.toml`, so an entry decodes directly from a buildpack descriptor
/// and round-trips losslessly through layer metadata files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: DependencyId,
    #[serde(default)]
    pub name: String,
    pub version: Version,
    pub uri: String,
    pub sha256: Checksum,
    #[serde(default)]
    pub stacks: Stacks,
    #[serde(default)]
    pub licenses: Licenses,
}

impl Dependency {
    pub fn validate(&self) -> Result<(), SchemaError> {
        let required = [
            ("id", self.id.as_str()),
            ("name", self.name.as_str()),
            ("uri", self.uri.as_str()),
            ("sha256", self.sha256.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(SchemaError::Validation(format!(
                    "dependency {field} must not be empty"
                )));
            }
        }
        if self.sha256.len() != 64 || !self.sha256.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(SchemaError::Validation(format!(
                "dependency '{}' sha256 is not a hex SHA-256 digest: '{}'",
                self.id, self.sha256
            )));
        }
        self.stacks.validate()?;
        self.licenses.validate()?;
        Ok(())
    }

    /// Last path segment of [`Self::uri`], ignoring any query or fragment.
    /// This is the file name the artifact is cached under.
    pub fn artifact_name(&self) -> &str {
        let end = self.uri.find(['?', '#']).unwrap_or(self.uri.len());
        let path = self.uri[..end].trim_end_matches('/');
        match path.rsplit_once('/') {
            Some((_, name)) if !name.is_empty() => name,
            _ => path,
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} ({}, stacks {})",
            self.id, self.version, self.sha256, self.stacks
        )
    }
}
