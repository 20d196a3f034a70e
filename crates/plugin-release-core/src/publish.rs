//! Publish Orchestrator
//!
//! One run: validate the registry, normalize it, pick the plugins to
//! package, then check out, package and (in publish mode) upload each of
//! them in turn. The first failure stops the run; uploads that already
//! happened are left in place.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::config::DEFAULT_REFERENCE_REVISION;
use crate::error::Result;
use crate::git::SourceControl;
use crate::manifest::{
    sort_gitmodules_file, sort_plugins_file, GitModules, PluginsManifest, GITMODULES_FILE,
    PLUGINS_FILE,
};
use crate::packager::{package_one, Artifact, Packager};
use crate::selection::{changed_since_reference, unpublished, SelectionSet};
use crate::store::{list_published_versions, object_key, BlobStore};
use crate::validation::{validate_plugin_ids, validate_submodule_refs, validate_submodule_urls};
use crate::workspace::BuildWorkspace;

/// Options for a single run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Restrict the run to this plugin id
    pub selected_id: Option<String>,
    /// Select by absence from the store and upload, instead of selecting
    /// by change since `reference_revision`
    pub should_publish: bool,
    pub reference_revision: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            selected_id: None,
            should_publish: false,
            reference_revision: DEFAULT_REFERENCE_REVISION.to_string(),
        }
    }
}

/// A plugin that was packaged (and possibly uploaded) during a run
#[derive(Debug, Clone)]
pub struct PackagedPlugin {
    pub id: String,
    pub version: String,
    /// Display name from the produced metadata
    pub name: String,
    pub warnings: Vec<String>,
    /// Empty unless the run was publishing
    pub uploaded_keys: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub selected: SelectionSet,
    pub packaged: Vec<PackagedPlugin>,
}

impl RunSummary {
    pub fn uploaded_count(&self) -> usize {
        self.packaged.iter().map(|p| p.uploaded_keys.len()).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.packaged.iter().map(|p| p.warnings.len()).sum()
    }
}

/// Drives the pipeline over a repository checkout
pub struct Publisher<'a> {
    repo_root: PathBuf,
    store: &'a dyn BlobStore,
    source_control: &'a dyn SourceControl,
    packager: &'a dyn Packager,
}

impl<'a> Publisher<'a> {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        store: &'a dyn BlobStore,
        source_control: &'a dyn SourceControl,
        packager: &'a dyn Packager,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            store,
            source_control,
            packager,
        }
    }

    /// Execute one run. The build workspace is removed whatever the outcome.
    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        let workspace = BuildWorkspace::create_in(&self.repo_root)?;
        let result = self.run_in(&workspace, options).await;
        let closed = workspace.close();

        match (result, closed) {
            (Ok(summary), Ok(())) => Ok(summary),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    tracing::warn!("failed to remove build workspace: {}", close_err);
                }
                Err(e)
            }
        }
    }

    async fn run_in(
        &self,
        workspace: &BuildWorkspace,
        options: &RunOptions,
    ) -> Result<RunSummary> {
        let plugins_path = self.repo_root.join(PLUGINS_FILE);
        let modules_path = self.repo_root.join(GITMODULES_FILE);

        let plugins = PluginsManifest::load(&plugins_path)?;
        let modules = GitModules::load(&modules_path)?;

        validate_plugin_ids(&plugins)?;
        validate_submodule_urls(&modules)?;
        validate_submodule_refs(&plugins, &modules)?;

        sort_plugins_file(&plugins_path)?;
        sort_gitmodules_file(&modules_path)?;

        let mut selection = if options.should_publish {
            let index = list_published_versions(self.store).await?;
            unpublished(&plugins, &index)
        } else {
            changed_since_reference(&plugins, self.source_control, &options.reference_revision)
                .await?
        };

        if let Some(id) = options.selected_id.as_deref() {
            if !plugins.contains(id) {
                tracing::warn!("Extension {} is not registered in {}", id, PLUGINS_FILE);
            }
            selection = selection.narrow_to(id);
        }

        let mut summary = RunSummary {
            selected: selection.clone(),
            packaged: Vec::with_capacity(selection.len()),
        };

        for id in selection.iter() {
            let Some(entry) = plugins.get(id) else {
                continue;
            };
            tracing::info!("Packaging '{}'. Version: {}", id, entry.version);

            self.source_control
                .checkout_submodule(Path::new(&entry.submodule))
                .await?;

            let dirs = workspace.package_dirs(id)?;
            let source_dir = self.repo_root.join(entry.source_dir());
            let result =
                package_one(self.packager, &dirs, id, &source_dir, &entry.version).await?;

            let uploaded_keys = if options.should_publish {
                self.upload(id, &entry.version, result.artifacts).await?
            } else {
                Vec::new()
            };

            summary.packaged.push(PackagedPlugin {
                id: id.to_string(),
                version: entry.version.clone(),
                name: result.metadata.name,
                warnings: result.warnings,
                uploaded_keys,
            });
        }

        Ok(summary)
    }

    async fn upload(
        &self,
        plugin_id: &str,
        version: &str,
        artifacts: Vec<Artifact>,
    ) -> Result<Vec<String>> {
        let mut keys = Vec::with_capacity(artifacts.len());

        for artifact in artifacts {
            let key = object_key(plugin_id, version, &artifact.filename);
            let digest = hex::encode(Sha256::digest(&artifact.bytes));
            tracing::info!(
                size = artifact.bytes.len(),
                sha256 = %digest,
                "Uploading {}",
                key
            );
            self.store.put(&key, artifact.bytes).await?;
            keys.push(key);
        }

        Ok(keys)
    }
}
