pub mod config;
pub mod error;
pub mod git;
pub mod manifest;
pub mod metadata;
pub mod packager;
pub mod policy;
pub mod publish;
pub mod selection;
pub mod store;
pub mod validation;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use config::{PublishConfig, StoreConfig};
pub use error::{PublishError, Result};
pub use git::{GitCli, SourceControl};
pub use manifest::{
    atomic_write, normalize_plugins_toml, sort_gitmodules_file, sort_plugins_file, GitModules,
    PluginEntry, PluginsManifest, SubmoduleEntry, GITMODULES_FILE, PLUGINS_FILE,
};
pub use metadata::{ExtensionMetadata, SourceManifest};
pub use packager::{
    package_one, Artifact, ExternalPackager, PackageResult, Packager, PackagerInvocation,
    PackagerOutput,
};
pub use policy::NamingPolicy;
pub use publish::{PackagedPlugin, Publisher, RunOptions, RunSummary};
pub use selection::{changed_between, changed_since_reference, unpublished, SelectionSet};
pub use store::{
    list_published_versions, object_key, BlobStore, ListPage, PublishedIndex, S3BlobStore,
};
pub use validation::{
    validate_display_name, validate_plugin_id, validate_plugin_ids, validate_submodule_refs,
    validate_submodule_urls,
};
pub use workspace::{BuildWorkspace, PackageDirs};
