//! Choosing which plugins a run packages

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{PublishError, Result};
use crate::git::SourceControl;
use crate::manifest::{PluginsManifest, PLUGINS_FILE};
use crate::store::PublishedIndex;

/// Plugin ids selected for packaging, in registry order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: Vec<String>,
}

impl SelectionSet {
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Keep only `id`. Selecting an id that is not in the set empties it.
    pub fn narrow_to(self, id: &str) -> Self {
        Self {
            ids: self.ids.into_iter().filter(|selected| selected == id).collect(),
        }
    }

    fn from_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Self {
        Self {
            ids: ids.map(str::to_string).collect(),
        }
    }
}

/// Plugins whose registry version has no object in the store
pub fn unpublished(plugins: &PluginsManifest, index: &PublishedIndex) -> SelectionSet {
    let selection = SelectionSet::from_ids(
        plugins
            .iter()
            .filter(|(id, entry)| !index.is_published(id, &entry.version))
            .map(|(id, _)| id),
    );
    tracing::info!("Extensions to publish: {}", format_ids(&selection));
    selection
}

/// Versions declared by a historical `plugins.toml`.
///
/// Only `version` is read so that older registries with a different shape
/// still parse.
pub fn reference_versions(content: &str, origin: &Path) -> Result<BTreeMap<String, String>> {
    let table: toml::Table = toml::from_str(content).map_err(|e| PublishError::Parse {
        path: origin.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(table
        .iter()
        .filter_map(|(id, value)| {
            let version = value.get("version")?.as_str()?;
            Some((id.clone(), version.to_string()))
        })
        .collect())
}

/// Plugins that are new or whose version differs from `reference`
pub fn changed_between(
    plugins: &PluginsManifest,
    reference: &BTreeMap<String, String>,
) -> SelectionSet {
    SelectionSet::from_ids(
        plugins
            .iter()
            .filter(|(id, entry)| reference.get(*id) != Some(&entry.version))
            .map(|(id, _)| id),
    )
}

/// Compare the registry against its state at `revision`
pub async fn changed_since_reference(
    plugins: &PluginsManifest,
    source_control: &dyn SourceControl,
    revision: &str,
) -> Result<SelectionSet> {
    let content = source_control
        .read_file_at_revision(PLUGINS_FILE, revision)
        .await?;
    let origin = format!("{revision}:{PLUGINS_FILE}");
    let reference = reference_versions(&content, Path::new(&origin))?;

    let selection = changed_between(plugins, &reference);
    tracing::info!(
        "Extensions changed from {}: {}",
        revision,
        format_ids(&selection)
    );
    Ok(selection)
}

fn format_ids(selection: &SelectionSet) -> String {
    if selection.is_empty() {
        "(none)".to_string()
    } else {
        selection.ids.join(", ")
    }
}
