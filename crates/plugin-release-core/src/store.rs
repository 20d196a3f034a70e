//! Blob store access and the published-version index
//!
//! Published artifacts live under `plugins/<id>/<version>/<filename>`.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::config::StoreConfig;
use crate::error::{PublishError, Result};

/// Top-level key prefix for every published plugin
pub const PLUGINS_PREFIX: &str = "plugins";

/// Key under which a plugin artifact is published
pub fn object_key(plugin_id: &str, version: &str, filename: &str) -> String {
    format!("{PLUGINS_PREFIX}/{plugin_id}/{version}/{filename}")
}

/// One page of an object listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub is_truncated: bool,
}

/// Object storage capability
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List keys under `prefix` that sort after `marker`
    async fn list_page(&self, prefix: &str, marker: Option<&str>) -> Result<ListPage>;

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;
}

/// S3-compatible bucket (DigitalOcean Spaces by default)
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(config: &StoreConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "environment",
        );
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(config.endpoint.clone())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(false)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn list_page(&self, prefix: &str, marker: Option<&str>) -> Result<ListPage> {
        let response = self
            .client
            .list_objects()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_marker(marker.map(str::to_string))
            .send()
            .await
            .map_err(|e| PublishError::StoreList {
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let keys = response
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect();

        Ok(ListPage {
            keys,
            is_truncated: response.is_truncated().unwrap_or(false),
        })
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| PublishError::Upload {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }
}

/// Snapshot of which plugin versions already exist in the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishedIndex {
    versions: BTreeMap<String, BTreeSet<String>>,
    object_count: usize,
}

impl PublishedIndex {
    /// Record one object key, rejecting keys without an id or version
    pub fn record_key(&mut self, key: &str) -> Result<()> {
        let malformed = |reason: &str| PublishError::MalformedKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = key.split('/');
        let _prefix = segments.next();
        let plugin_id = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| malformed("no extension id"))?;
        let version = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| malformed("no version"))?;

        self.versions
            .entry(plugin_id.to_string())
            .or_default()
            .insert(version.to_string());
        self.object_count += 1;
        Ok(())
    }

    pub fn is_published(&self, plugin_id: &str, version: &str) -> bool {
        self.versions
            .get(plugin_id)
            .is_some_and(|versions| versions.contains(version))
    }

    pub fn versions(&self, plugin_id: &str) -> Option<&BTreeSet<String>> {
        self.versions.get(plugin_id)
    }

    /// Number of distinct plugins with at least one published version
    pub fn plugin_count(&self) -> usize {
        self.versions.len()
    }

    /// Number of objects scanned while building the index
    pub fn object_count(&self) -> usize {
        self.object_count
    }
}

/// Page through the whole `plugins/` listing and build the index.
///
/// Each page's last key is the marker for the next request; the walk ends
/// with the first page that is not truncated.
pub async fn list_published_versions(store: &dyn BlobStore) -> Result<PublishedIndex> {
    let prefix = format!("{PLUGINS_PREFIX}/");
    let mut index = PublishedIndex::default();
    let mut marker: Option<String> = None;

    loop {
        let page = store.list_page(&prefix, marker.as_deref()).await?;
        tracing::info!("Retrieved {} object(s) from bucket.", page.keys.len());

        for key in &page.keys {
            index.record_key(key)?;
        }

        if !page.is_truncated {
            break;
        }
        match page.keys.last() {
            Some(last) => marker = Some(last.clone()),
            None => {
                tracing::warn!("bucket reported a truncated listing with no objects");
                break;
            }
        }
    }

    tracing::debug!(
        plugins = index.plugin_count(),
        objects = index.object_count(),
        "built published-version index"
    );
    Ok(index)
}
