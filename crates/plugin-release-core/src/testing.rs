//! In-memory stand-ins for the pipeline's capabilities

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{PublishError, Result};
use crate::git::SourceControl;
use crate::metadata::OUTPUT_MANIFEST_FILE;
use crate::packager::{Packager, PackagerInvocation, PackagerOutput};
use crate::store::{BlobStore, ListPage};

type Handler = Box<dyn Fn(&PackagerInvocation) -> PackagerOutput + Send + Sync>;

pub(crate) struct FakePackager {
    handler: Handler,
    stderr: String,
    invocations: Mutex<Vec<PackagerInvocation>>,
    calls: AtomicUsize,
}

impl FakePackager {
    pub fn new(handler: Handler) -> Self {
        Self {
            handler,
            stderr: String::new(),
            invocations: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Writes `manifest.json` with `name`/`version` and one archive
    pub fn producing(name: &str, version: &str) -> Self {
        let manifest = serde_json::json!({
            "name": name,
            "version": version,
            "authors": ["Test <test@example.com>"],
        })
        .to_string();

        Self::new(Box::new(move |invocation| {
            fs::write(invocation.output_dir.join(OUTPUT_MANIFEST_FILE), &manifest).unwrap();
            fs::write(invocation.output_dir.join("archive.tar.gz"), b"archive").unwrap();
            PackagerOutput {
                stdout: "packaged\n".to_string(),
                stderr: String::new(),
                exit_code: Some(0),
            }
        }))
    }

    /// Writes `manifest.json` using the version found in the source tree's
    /// `VERSION` file, so one packager can serve several plugins
    pub fn from_source_version() -> Self {
        Self::new(Box::new(|invocation| {
            let version = fs::read_to_string(invocation.source_dir.join("VERSION")).unwrap();
            let manifest = serde_json::json!({
                "name": "Fixture Plugin",
                "version": version.trim(),
            });
            fs::write(
                invocation.output_dir.join(OUTPUT_MANIFEST_FILE),
                manifest.to_string(),
            )
            .unwrap();
            fs::write(invocation.output_dir.join("archive.tar.gz"), b"archive").unwrap();
            PackagerOutput {
                exit_code: Some(0),
                ..Default::default()
            }
        }))
    }

    pub fn failing(code: i32, stderr: &str) -> Self {
        let stderr = stderr.to_string();
        Self::new(Box::new(move |_| PackagerOutput {
            stdout: String::new(),
            stderr: stderr.clone(),
            exit_code: Some(code),
        }))
    }

    pub fn with_stderr(mut self, stderr: &str) -> Self {
        self.stderr = stderr.to_string();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_invocation(&self) -> Option<PackagerInvocation> {
        self.invocations.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Packager for FakePackager {
    async fn run(&self, invocation: &PackagerInvocation) -> Result<PackagerOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.invocations.lock().unwrap().push(invocation.clone());
        let mut output = (self.handler)(invocation);
        if !self.stderr.is_empty() {
            output.stderr = self.stderr.clone();
        }
        Ok(output)
    }
}

#[derive(Default)]
pub(crate) struct FakeSourceControl {
    files: HashMap<(String, String), String>,
    failing_path: Option<PathBuf>,
    checkouts: Mutex<Vec<PathBuf>>,
}

impl FakeSourceControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, revision: &str, path: &str, content: &str) -> Self {
        self.files
            .insert((revision.to_string(), path.to_string()), content.to_string());
        self
    }

    pub fn failing_checkout(mut self, path: &str) -> Self {
        self.failing_path = Some(PathBuf::from(path));
        self
    }

    pub fn checkouts(&self) -> Vec<PathBuf> {
        self.checkouts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceControl for FakeSourceControl {
    async fn checkout_submodule(&self, path: &Path) -> Result<()> {
        if self.failing_path.as_deref() == Some(path) {
            return Err(PublishError::Checkout {
                path: path.to_path_buf(),
                message: "not a registered submodule".to_string(),
            });
        }
        self.checkouts.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn read_file_at_revision(&self, path: &str, revision: &str) -> Result<String> {
        self.files
            .get(&(revision.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| {
                PublishError::Git(format!("path '{path}' does not exist in '{revision}'"))
            })
    }
}

/// Bucket with S3-style marker pagination
pub(crate) struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    page_size: usize,
    list_markers: Mutex<Vec<Option<String>>>,
    puts: Mutex<Vec<String>>,
    fail_puts: bool,
}

impl MemoryStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size,
            list_markers: Mutex::new(Vec::new()),
            puts: Mutex::new(Vec::new()),
            fail_puts: false,
        }
    }

    pub fn with_keys(self, keys: &[&str]) -> Self {
        {
            let mut objects = self.objects.lock().unwrap();
            for key in keys {
                objects.insert(key.to_string(), Vec::new());
            }
        }
        self
    }

    pub fn failing_puts(mut self) -> Self {
        self.fail_puts = true;
        self
    }

    pub fn list_markers(&self) -> Vec<Option<String>> {
        self.list_markers.lock().unwrap().clone()
    }

    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn list_page(&self, prefix: &str, marker: Option<&str>) -> Result<ListPage> {
        self.list_markers
            .lock()
            .unwrap()
            .push(marker.map(str::to_string));

        let objects = self.objects.lock().unwrap();
        let mut matching = objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .filter(|key| marker.map_or(true, |marker| key.as_str() > marker));

        let keys: Vec<String> = matching.by_ref().take(self.page_size).cloned().collect();
        let is_truncated = matching.next().is_some();
        Ok(ListPage { keys, is_truncated })
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        if self.fail_puts {
            return Err(PublishError::Upload {
                key: key.to_string(),
                message: "access denied".to_string(),
            });
        }
        self.puts.lock().unwrap().push(key.to_string());
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }
}
