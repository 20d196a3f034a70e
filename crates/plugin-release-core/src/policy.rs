//! Naming policy for marketplace plugins
//!
//! Ids and display names that look like first-party plugins are reserved.
//! The allow-lists below are the only sanctioned exceptions and are edited
//! by maintainers only.

/// Reserved affixes plus the exceptions granted for them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingPolicy {
    /// Reserved id prefix, e.g. `khulnasoft-`
    pub id_prefix: &'static str,
    /// Reserved id suffix, e.g. `-khulnasoft`
    pub id_suffix: &'static str,
    /// Ids allowed to start with `id_prefix`
    pub id_prefix_exceptions: &'static [&'static str],
    /// Ids allowed to end with `id_suffix`
    pub id_suffix_exceptions: &'static [&'static str],
    /// Reserved display name prefix, e.g. `Khulnasoft `
    pub name_prefix: &'static str,
    /// Reserved display name suffix, e.g. ` Khulnasoft`
    pub name_suffix: &'static str,
    /// Names allowed to start with `name_prefix`
    pub name_prefix_exceptions: &'static [&'static str],
    /// Names allowed to end with `name_suffix`
    pub name_suffix_exceptions: &'static [&'static str],
}

impl NamingPolicy {
    /// Policy applied by the release pipeline
    pub const DEFAULT: NamingPolicy = NamingPolicy {
        id_prefix: "khulnasoft-",
        id_suffix: "-khulnasoft",
        id_prefix_exceptions: &["khulnasoft-legacy-themes"],
        id_suffix_exceptions: &["xy-khulnasoft"],
        name_prefix: "Khulnasoft ",
        name_suffix: " Khulnasoft",
        name_prefix_exceptions: &["Khulnasoft Legacy Themes"],
        name_suffix_exceptions: &[],
    };

    pub fn id_prefix_allowed(&self, id: &str) -> bool {
        !id.starts_with(self.id_prefix) || self.id_prefix_exceptions.iter().any(|e| *e == id)
    }

    pub fn id_suffix_allowed(&self, id: &str) -> bool {
        !id.ends_with(self.id_suffix) || self.id_suffix_exceptions.iter().any(|e| *e == id)
    }

    pub fn name_prefix_allowed(&self, name: &str) -> bool {
        !name.starts_with(self.name_prefix)
            || self.name_prefix_exceptions.iter().any(|e| *e == name)
    }

    pub fn name_suffix_allowed(&self, name: &str) -> bool {
        !name.ends_with(self.name_suffix)
            || self.name_suffix_exceptions.iter().any(|e| *e == name)
    }
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}
