use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PublishError, Result};

pub const DEFAULT_S3_ENDPOINT: &str = "https://nyc3.digitaloceanspaces.com";
pub const DEFAULT_S3_REGION: &str = "nyc3";
pub const DEFAULT_PACKAGER_BIN: &str = "./khulnasoft-plugin";
pub const DEFAULT_PACKAGER_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_REFERENCE_REVISION: &str = "origin/main";

/// Blob store connection settings
#[derive(Clone)]
pub struct StoreConfig {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
}

fn default_endpoint() -> String {
    DEFAULT_S3_ENDPOINT.to_string()
}

fn default_region() -> String {
    DEFAULT_S3_REGION.to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            bucket: String::new(),
            endpoint: default_endpoint(),
            region: default_region(),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("access_key", &redacted(&self.access_key))
            .field("secret_key", &redacted(&self.secret_key))
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

/// Settings for one pipeline run, read from the environment
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub store: StoreConfig,
    /// Upload artifacts instead of only packaging changed plugins
    pub should_publish: bool,
    pub packager_bin: PathBuf,
    pub packager_timeout: Duration,
    /// Baseline for changed-plugin selection
    pub reference_revision: String,
}

impl PublishConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let should_publish = var("SHOULD_PUBLISH").as_deref() == Some("true");

        let store = StoreConfig {
            access_key: var("S3_ACCESS_KEY").unwrap_or_default(),
            secret_key: var("S3_SECRET_KEY").unwrap_or_default(),
            bucket: var("S3_BUCKET").unwrap_or_default(),
            endpoint: var("S3_ENDPOINT").unwrap_or_else(default_endpoint),
            region: var("S3_REGION").unwrap_or_else(default_region),
        };

        if should_publish && store.bucket.is_empty() {
            return Err(PublishError::Config {
                message: "S3_BUCKET must be set when SHOULD_PUBLISH is true".to_string(),
            });
        }

        let packager_timeout = match var("PACKAGER_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| PublishError::Config {
                message: format!("PACKAGER_TIMEOUT_SECS is not a number of seconds: {raw}"),
            })?,
            None => DEFAULT_PACKAGER_TIMEOUT_SECS,
        };

        Ok(Self {
            store,
            should_publish,
            packager_bin: var("PACKAGER_BIN")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PACKAGER_BIN)),
            packager_timeout: Duration::from_secs(packager_timeout),
            reference_revision: var("REFERENCE_REVISION")
                .unwrap_or_else(|| DEFAULT_REFERENCE_REVISION.to_string()),
        })
    }
}
