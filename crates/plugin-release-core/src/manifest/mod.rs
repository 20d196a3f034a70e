//! Manifest Store
//!
//! - `plugins`: `plugins.toml` (plugin id → version, submodule, subpath)
//! - `gitmodules`: `.gitmodules` (submodule name → path, url)
//! - `atomic`: all-or-nothing writes used by both

mod atomic;
mod gitmodules;
mod plugins;

pub use atomic::atomic_write;
pub use gitmodules::{sort_gitmodules_file, GitModules, SubmoduleEntry, GITMODULES_FILE};
pub use plugins::{
    normalize_plugins_toml, sort_plugins_file, PluginEntry, PluginsManifest, PLUGINS_FILE,
};
