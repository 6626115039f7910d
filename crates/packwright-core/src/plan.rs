use packwright_schema::Dependency;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a build provided for one dependency id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildPlanEntry {
    pub version: String,
    #[serde(default)]
    pub metadata: toml::Table,
}

impl BuildPlanEntry {
    pub fn from_dependency(dependency: &Dependency) -> Self {
        let mut metadata = toml::Table::new();
        metadata.insert("name".to_owned(), dependency.name.clone().into());
        metadata.insert("uri".to_owned(), dependency.uri.clone().into());
        metadata.insert("sha256".to_owned(), dependency.sha256.to_string().into());
        metadata.insert(
            "stacks".to_owned(),
            toml::Value::Array(dependency.stacks.iter().map(toml::Value::from).collect()),
        );
        Self {
            version: dependency.version.to_string(),
            metadata,
        }
    }
}

/// Dependencies contributed during a session, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildPlan(BTreeMap<String, BuildPlanEntry>);

impl BuildPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `dependency`, replacing any earlier entry for its id.
    pub fn add(&mut self, dependency: &Dependency) {
        self.0.insert(
            dependency.id.to_string(),
            BuildPlanEntry::from_dependency(dependency),
        );
    }

    pub fn get(&self, id: &str) -> Option<&BuildPlanEntry> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BuildPlanEntry)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
