//! `plugins.toml` registry
//!
//! Maps plugin id to its published version and the submodule holding its
//! sources:
//!
//! ```toml
//! [my-theme]
//! submodule = "plugins/my-theme"
//! version = "0.2.1"
//!
//! [monorepo-tool]
//! path = "packages/tool"
//! submodule = "plugins/monorepo"
//! version = "1.0.0"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PublishError, Result};
use crate::manifest::atomic::atomic_write;

/// Default registry file name at the repository root
pub const PLUGINS_FILE: &str = "plugins.toml";

/// A single registry entry (the id is the table key)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginEntry {
    /// Version that must match the packaged artifact
    pub version: String,
    /// Path of the git submodule containing the sources
    pub submodule: String,
    /// Optional subdirectory inside the submodule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Keys this tool does not interpret, kept as-is
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl PluginEntry {
    pub fn new(version: impl Into<String>, submodule: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            submodule: submodule.into(),
            path: None,
            extra: toml::Table::new(),
        }
    }

    /// Directory holding the plugin sources, relative to the repository root
    pub fn source_dir(&self) -> PathBuf {
        let submodule = PathBuf::from(&self.submodule);
        match &self.path {
            Some(sub) => submodule.join(sub),
            None => submodule,
        }
    }
}

/// Parsed `plugins.toml`, iterated in ascending id order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginsManifest {
    entries: BTreeMap<String, PluginEntry>,
}

impl PluginsManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and parse a registry file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Parse registry content; `origin` is only used in error messages
    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        let entries: BTreeMap<String, PluginEntry> =
            toml::from_str(content).map_err(|e| PublishError::Parse {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(Self { entries })
    }

    pub fn insert(&mut self, id: impl Into<String>, entry: PluginEntry) {
        self.entries.insert(id.into(), entry);
    }

    pub fn get(&self, id: &str) -> Option<&PluginEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PluginEntry)> {
        self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, PluginEntry)> for PluginsManifest {
    fn from_iter<I: IntoIterator<Item = (String, PluginEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Render registry content with tables in ascending key order.
///
/// Values are untouched; only ordering and trailing whitespace change.
pub fn normalize_plugins_toml(content: &str, origin: &Path) -> Result<String> {
    let table: toml::Table = toml::from_str(content).map_err(|e| PublishError::Parse {
        path: origin.to_path_buf(),
        message: e.to_string(),
    })?;
    let rendered = toml::to_string(&table)?;
    Ok(format!("{}\n", rendered.trim_end()))
}

/// Rewrite a registry file in sorted order. Returns whether the file changed.
pub fn sort_plugins_file(path: &Path) -> Result<bool> {
    let content = fs::read_to_string(path)?;
    let sorted = normalize_plugins_toml(&content, path)?;
    if sorted == content {
        return Ok(false);
    }

    atomic_write(path, sorted.as_bytes())?;
    tracing::debug!(path = %path.display(), "sorted plugin registry");
    Ok(true)
}
