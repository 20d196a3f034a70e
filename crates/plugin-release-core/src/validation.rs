//! Registry and metadata validation
//!
//! Every check stops at the first offending entry, visiting entries in
//! ascending key order, so a CI run always reports the same single error.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{PublishError, Result};
use crate::manifest::{GitModules, PluginsManifest, GITMODULES_FILE};
use crate::metadata::ExtensionMetadata;
use crate::policy::NamingPolicy;

static PLUGIN_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").expect("plugin id pattern is valid"));

const SECURE_SCHEME: &str = "https://";

/// Check a single plugin id against the character rule and reserved affixes
pub fn validate_plugin_id(id: &str, policy: &NamingPolicy) -> Result<()> {
    if !PLUGIN_ID_PATTERN.is_match(id) {
        return Err(PublishError::policy(format!(
            "Extension IDs must only consist of lowercase letters, numbers, and hyphens ('-'): \"{id}\"."
        )));
    }

    if !policy.id_prefix_allowed(id) {
        return Err(PublishError::policy(format!(
            "Extension IDs should not start with \"{}\", as they are all Khulnasoft plugins: \"{id}\".",
            policy.id_prefix
        )));
    }

    if !policy.id_suffix_allowed(id) {
        return Err(PublishError::policy(format!(
            "Extension IDs should not end with \"{}\", as they are all Khulnasoft plugins: \"{id}\".",
            policy.id_suffix
        )));
    }

    Ok(())
}

pub fn validate_plugin_ids(plugins: &PluginsManifest) -> Result<()> {
    validate_plugin_ids_with(plugins, &NamingPolicy::DEFAULT)
}

pub fn validate_plugin_ids_with(plugins: &PluginsManifest, policy: &NamingPolicy) -> Result<()> {
    plugins
        .ids()
        .try_for_each(|id| validate_plugin_id(id, policy))
}

pub fn validate_display_name(metadata: &ExtensionMetadata) -> Result<()> {
    validate_display_name_with(metadata, &NamingPolicy::DEFAULT)
}

pub fn validate_display_name_with(
    metadata: &ExtensionMetadata,
    policy: &NamingPolicy,
) -> Result<()> {
    let name = metadata.name.as_str();

    if !policy.name_prefix_allowed(name) {
        return Err(PublishError::policy(format!(
            "Extension names should not start with \"{}\", as they are all Khulnasoft plugins: \"{name}\".",
            policy.name_prefix
        )));
    }

    if !policy.name_suffix_allowed(name) {
        return Err(PublishError::policy(format!(
            "Extension names should not end with \"{}\", as they are all Khulnasoft plugins: \"{name}\".",
            policy.name_suffix
        )));
    }

    Ok(())
}

/// Every submodule needs an `https://` URL
pub fn validate_submodule_urls(modules: &GitModules) -> Result<()> {
    for entry in modules.iter() {
        let url = match entry.url.as_deref() {
            Some(url) => url,
            None => {
                return Err(PublishError::policy(format!(
                    "Missing URL for \"{}\".",
                    entry.name
                )))
            }
        };

        if !url.starts_with(SECURE_SCHEME) {
            return Err(PublishError::policy(format!(
                "Submodules must use \"{SECURE_SCHEME}\" scheme: \"{}\" uses \"{url}\".",
                entry.name
            )));
        }
    }

    Ok(())
}

/// Every plugin must point at a submodule listed in `.gitmodules`
pub fn validate_submodule_refs(plugins: &PluginsManifest, modules: &GitModules) -> Result<()> {
    for (id, entry) in plugins.iter() {
        if modules.by_path(&entry.submodule).is_none() {
            return Err(PublishError::policy(format!(
                "Extension \"{id}\" uses submodule \"{}\", which is not listed in {GITMODULES_FILE}.",
                entry.submodule
            )));
        }
    }

    Ok(())
}
