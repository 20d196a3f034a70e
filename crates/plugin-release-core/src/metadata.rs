//! Extension manifests
//!
//! - `extension.toml`: the manifest inside a plugin's source tree
//! - `manifest.json`: the metadata the packager writes next to the artifacts

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PublishError, Result};

/// Current source manifest file name
pub const SOURCE_MANIFEST_FILE: &str = "extension.toml";
/// Superseded source manifest file name, rejected outright
pub const LEGACY_MANIFEST_FILE: &str = "extension.json";
/// Metadata file produced by the packager
pub const OUTPUT_MANIFEST_FILE: &str = "manifest.json";

/// `extension.toml` as far as the release pipeline cares
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceManifest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl SourceManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PublishError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// `manifest.json` produced by the packager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionMetadata {
    pub name: String,
    pub version: String,
    /// Authors, description, repository, provided capabilities, ...
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

impl ExtensionMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            rest: serde_json::Map::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| PublishError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
