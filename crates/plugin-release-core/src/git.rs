//! Source control access
//!
//! Submodule checkout and historical reads go through the `git` CLI of the
//! host repository.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{PublishError, Result};

/// Git object mode of a submodule pointer in the index
const GITLINK_MODE: &str = "160000";

/// Version-control capability used by the pipeline
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Check out the submodule at `path` to the commit recorded by the host repository
    async fn checkout_submodule(&self, path: &Path) -> Result<()>;

    /// Read `path` as it existed at `revision`
    async fn read_file_at_revision(&self, path: &str, revision: &str) -> Result<String>;
}

/// `SourceControl` backed by the `git` executable
pub struct GitCli {
    repo_root: PathBuf,
}

impl GitCli {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    async fn git(&self, dir: &Path, args: &[&str]) -> Result<Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .kill_on_drop(true)
            .output()
            .await?;
        Ok(output)
    }

    /// Run git for a checkout step, mapping failure to `Checkout`
    async fn checkout_step(&self, dir: &Path, submodule: &Path, args: &[&str]) -> Result<Output> {
        let output = self.git(dir, args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PublishError::Checkout {
                path: submodule.to_path_buf(),
                message: format!("git {} failed: {}", args.join(" "), stderr.trim()),
            });
        }
        Ok(output)
    }

    /// Commit recorded for the submodule in the host index
    async fn recorded_commit(&self, path: &Path, path_arg: &str) -> Result<String> {
        let output = self
            .checkout_step(
                &self.repo_root,
                path,
                &["ls-files", "--stage", "--", path_arg],
            )
            .await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        parse_gitlink(&stdout).ok_or_else(|| PublishError::Checkout {
            path: path.to_path_buf(),
            message: "not a registered submodule".to_string(),
        })
    }

    async fn has_commit(&self, submodule_dir: &Path, sha: &str) -> Result<bool> {
        let object = format!("{sha}^{{commit}}");
        let output = self
            .git(submodule_dir, &["cat-file", "-e", object.as_str()])
            .await?;
        Ok(output.status.success())
    }
}

#[async_trait]
impl SourceControl for GitCli {
    async fn checkout_submodule(&self, path: &Path) -> Result<()> {
        let path_arg = path.to_string_lossy().to_string();
        let sha = self.recorded_commit(path, &path_arg).await?;
        let submodule_dir = self.repo_root.join(path);

        if !submodule_dir.join(".git").exists() {
            tracing::debug!(path = %path.display(), %sha, "initializing submodule");
            self.checkout_step(
                &self.repo_root,
                path,
                &["submodule", "update", "--init", "--depth", "1", "--", &path_arg],
            )
            .await?;
        } else if !self.has_commit(&submodule_dir, &sha).await? {
            tracing::debug!(path = %path.display(), %sha, "fetching submodule commit");
            self.checkout_step(
                &submodule_dir,
                path,
                &["fetch", "--depth", "1", "origin", &sha],
            )
            .await?;
        }

        self.checkout_step(
            &submodule_dir,
            path,
            &["checkout", "--detach", "--quiet", &sha],
        )
        .await?;

        tracing::info!(path = %path.display(), %sha, "checked out submodule");
        Ok(())
    }

    async fn read_file_at_revision(&self, path: &str, revision: &str) -> Result<String> {
        let object = format!("{revision}:{path}");
        let output = self.git(&self.repo_root, &["show", object.as_str()]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PublishError::Git(format!(
                "git show {} failed: {}",
                object,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Extract the commit from `git ls-files --stage` output for a gitlink entry
fn parse_gitlink(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let (meta, _path) = line.split_once('\t')?;
        let mut fields = meta.split_whitespace();
        let mode = fields.next()?;
        let sha = fields.next()?;
        (mode == GITLINK_MODE).then(|| sha.to_string())
    })
}
