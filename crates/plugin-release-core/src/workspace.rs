//! Scratch space for a packaging run
//!
//! The whole tree is removed when the workspace is dropped or closed, on
//! success and on every error path.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;

const WORKSPACE_PREFIX: &str = "build-";
const SCRATCH_DIR: &str = "scratch";
const OUTPUT_DIR: &str = "output";

/// Directories handed to the packager for one plugin
#[derive(Debug, Clone)]
pub struct PackageDirs {
    pub scratch_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// Run-scoped build directory
#[derive(Debug)]
pub struct BuildWorkspace {
    root: TempDir,
}

impl BuildWorkspace {
    /// Create a fresh workspace directory under `parent`
    pub fn create_in(parent: &Path) -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(parent)?;
        fs::create_dir_all(root.path().join(SCRATCH_DIR))?;
        fs::create_dir_all(root.path().join(OUTPUT_DIR))?;
        tracing::debug!(path = %root.path().display(), "created build workspace");
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Shared scratch directory plus an empty output directory for `plugin_id`
    pub fn package_dirs(&self, plugin_id: &str) -> Result<PackageDirs> {
        let output_dir = self.root.path().join(OUTPUT_DIR).join(plugin_id);
        if output_dir.exists() {
            fs::remove_dir_all(&output_dir)?;
        }
        fs::create_dir_all(&output_dir)?;

        Ok(PackageDirs {
            scratch_dir: self.root.path().join(SCRATCH_DIR),
            output_dir,
        })
    }

    /// Remove the workspace, reporting failures instead of ignoring them
    pub fn close(self) -> Result<()> {
        let path = self.root.path().to_path_buf();
        self.root.close()?;
        tracing::debug!(path = %path.display(), "removed build workspace");
        Ok(())
    }
}
