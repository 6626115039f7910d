use crate::dependency::Dependency;
use crate::version::VersionConstraint;
use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// An ordered dependency catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dependencies(Vec<Dependency>);

impl Dependencies {
    pub fn new(entries: Vec<Dependency>) -> Self {
        Self(entries)
    }

    /// Decode the `dependencies` array of a buildpack's `[metadata]` table.
    ///
    /// A missing key yields an empty catalog. Any shape mismatch is reported
    /// as [`SchemaError::InvalidDependencies`] naming the offending entry.
    pub fn from_metadata(metadata: &toml::Table) -> Result<Self, SchemaError> {
        let Some(value) = metadata.get("dependencies") else {
            return Ok(Self::default());
        };
        let toml::Value::Array(items) = value else {
            return Err(SchemaError::InvalidDependencies(
                "dependencies must be an array of tables".to_owned(),
            ));
        };

        let mut entries = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let dep = item.clone().try_into::<Dependency>().map_err(|e| {
                SchemaError::InvalidDependencies(format!("entry {idx}: {}", e.message()))
            })?;
            entries.push(dep);
        }
        debug!(count = entries.len(), "decoded dependency catalog");
        Ok(Self(entries))
    }

    /// Select the highest-versioned entry matching `id`, `constraint` and
    /// `stack`.
    ///
    /// An empty constraint matches every version. When several entries share
    /// the greatest version the first one in catalog order wins.
    pub fn best(&self, id: &str, constraint: &str, stack: &str) -> Result<Dependency, SchemaError> {
        let parsed = VersionConstraint::parse(constraint)?;
        self.best_matching(id, &parsed, stack)
            .cloned()
            .ok_or_else(|| SchemaError::NoValidDependencies {
                id: id.to_owned(),
                constraint: parsed.to_string(),
                stack: stack.to_owned(),
                candidates: self.candidates(),
            })
    }

    fn best_matching(
        &self,
        id: &str,
        constraint: &VersionConstraint,
        stack: &str,
    ) -> Option<&Dependency> {
        self.0
            .iter()
            .filter(|d| d.id == id)
            .filter(|d| constraint.matches(&d.version))
            .filter(|d| d.stacks.contains(stack))
            .fold(None, |best: Option<&Dependency>, candidate| match best {
                Some(current)
                    if candidate.version.cmp_precedence(&current.version)
                        != Ordering::Greater =>
                {
                    Some(current)
                }
                _ => Some(candidate),
            })
    }

    fn candidates(&self) -> String {
        let listed: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        format!("[{}]", listed.join(", "))
    }

    /// Whether any entry carries `id`.
    pub fn has(&self, id: &str) -> bool {
        self.0.iter().any(|d| d.id == id)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        self.0.iter().try_for_each(Dependency::validate)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Dependency> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Dependencies {
    type Item = &'a Dependency;
    type IntoIter = std::slice::Iter<'a, Dependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Dependency> for Dependencies {
    fn from_iter<T: IntoIterator<Item = Dependency>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
