//! Packager Adapter
//!
//! Runs the external packager against a plugin's source tree and checks the
//! result before anything is allowed near the blob store.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use walkdir::WalkDir;

use crate::error::{PublishError, Result};
use crate::metadata::{
    ExtensionMetadata, SourceManifest, LEGACY_MANIFEST_FILE, OUTPUT_MANIFEST_FILE,
    SOURCE_MANIFEST_FILE,
};
use crate::validation::validate_display_name;
use crate::workspace::PackageDirs;

/// Log filter handed to the packager process
const PACKAGER_LOG_LEVEL: &str = "info";

/// Marker the packager puts on warning-level log lines
const WARNING_MARKER: &str = "WARN";

/// Arguments for one packager run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagerInvocation {
    pub scratch_dir: PathBuf,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl PackagerInvocation {
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "--scratch-dir".into(),
            self.scratch_dir.clone().into_os_string(),
            "--source-dir".into(),
            self.source_dir.clone().into_os_string(),
            "--output-dir".into(),
            self.output_dir.clone().into_os_string(),
        ]
    }
}

/// Captured result of a packager process; stdout and stderr kept apart
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackagerOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl PackagerOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Packaging capability
#[async_trait]
pub trait Packager: Send + Sync {
    async fn run(&self, invocation: &PackagerInvocation) -> Result<PackagerOutput>;
}

/// `Packager` that spawns the packager binary
pub struct ExternalPackager {
    binary: PathBuf,
    working_dir: PathBuf,
    timeout: Duration,
}

impl ExternalPackager {
    pub fn new(
        binary: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            binary: binary.into(),
            working_dir: working_dir.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Packager for ExternalPackager {
    async fn run(&self, invocation: &PackagerInvocation) -> Result<PackagerOutput> {
        let mut command = Command::new(&self.binary);
        command
            .args(invocation.args())
            .current_dir(&self.working_dir)
            .env_clear()
            .env("RUST_LOG", PACKAGER_LOG_LEVEL)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            command.env("PATH", path);
        }

        let child = command.spawn().map_err(|e| PublishError::PackagerFailed {
            status: "spawn failure".to_string(),
            stderr: format!("failed to start {}: {}", self.binary.display(), e),
        })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(PublishError::PackagerTimeout {
                    seconds: self.timeout.as_secs(),
                })
            }
        };

        Ok(PackagerOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        })
    }
}

/// A file produced by the packager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Outcome of a successful packaging attempt
#[derive(Debug, Clone)]
pub struct PackageResult {
    pub plugin_id: String,
    pub declared_version: String,
    pub metadata: ExtensionMetadata,
    /// Warning lines from the packager, in emission order
    pub warnings: Vec<String>,
    /// Output files sorted by name
    pub artifacts: Vec<Artifact>,
}

/// Package one plugin and verify the result.
///
/// Fails before running the packager if the source tree still carries the
/// legacy manifest or declares a different id. After packaging, the produced
/// version must equal `declared_version` and the display name must pass
/// policy.
pub async fn package_one(
    packager: &dyn Packager,
    dirs: &PackageDirs,
    plugin_id: &str,
    source_dir: &Path,
    declared_version: &str,
) -> Result<PackageResult> {
    let legacy_manifest = source_dir.join(LEGACY_MANIFEST_FILE);
    if legacy_manifest.exists() {
        return Err(PublishError::LegacyManifest {
            path: legacy_manifest,
        });
    }

    let source_manifest = source_dir.join(SOURCE_MANIFEST_FILE);
    if source_manifest.exists() {
        let manifest = SourceManifest::load(&source_manifest)?;
        if manifest.id.as_deref() != Some(plugin_id) {
            return Err(PublishError::IdentityMismatch {
                expected: plugin_id.to_string(),
                actual: manifest.id.unwrap_or_else(|| "<missing>".to_string()),
            });
        }
    }

    let invocation = PackagerInvocation {
        scratch_dir: dirs.scratch_dir.clone(),
        source_dir: source_dir.to_path_buf(),
        output_dir: dirs.output_dir.clone(),
    };
    let output = packager.run(&invocation).await?;

    for line in output.stdout.lines().filter(|line| !line.trim().is_empty()) {
        tracing::info!(plugin = plugin_id, "{}", line);
    }

    if !output.success() {
        return Err(PublishError::PackagerFailed {
            status: match output.exit_code {
                Some(code) => format!("exit code {code}"),
                None => "signal".to_string(),
            },
            stderr: output.stderr.trim().to_string(),
        });
    }

    let warnings = collect_warnings(&output.stderr);
    for warning in &warnings {
        tracing::warn!(plugin = plugin_id, "{}", warning);
    }

    let metadata = ExtensionMetadata::load(&dirs.output_dir.join(OUTPUT_MANIFEST_FILE))?;
    if metadata.version != declared_version {
        return Err(PublishError::VersionMismatch {
            plugin_id: plugin_id.to_string(),
            name: metadata.name,
            expected: declared_version.to_string(),
            actual: metadata.version,
        });
    }

    validate_display_name(&metadata)?;

    let artifacts = read_artifacts(&dirs.output_dir)?;

    Ok(PackageResult {
        plugin_id: plugin_id.to_string(),
        declared_version: declared_version.to_string(),
        metadata,
        warnings,
        artifacts,
    })
}

fn collect_warnings(stderr: &str) -> Vec<String> {
    stderr
        .lines()
        .filter(|line| line.contains(WARNING_MARKER))
        .map(str::to_string)
        .collect()
}

fn read_artifacts(output_dir: &Path) -> Result<Vec<Artifact>> {
    let mut artifacts = Vec::new();

    for entry in WalkDir::new(output_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        artifacts.push(Artifact {
            filename: entry.file_name().to_string_lossy().to_string(),
            bytes: fs::read(entry.path())?,
        });
    }

    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePackager;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        source_dir: PathBuf,
        dirs: PackageDirs,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let source_dir = temp.path().join("plugins/sample-ext");
        let dirs = PackageDirs {
            scratch_dir: temp.path().join("scratch"),
            output_dir: temp.path().join("output"),
        };
        fs::create_dir_all(&source_dir).unwrap();
        fs::create_dir_all(&dirs.scratch_dir).unwrap();
        fs::create_dir_all(&dirs.output_dir).unwrap();
        Fixture {
            _temp: temp,
            source_dir,
            dirs,
        }
    }

    #[tokio::test]
    async fn test_package_one_success() {
        let fx = fixture();
        fs::write(
            fx.source_dir.join(SOURCE_MANIFEST_FILE),
            "id = \"sample-ext\"\nname = \"Sample\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();
        let packager = FakePackager::producing("Sample", "0.1.0");

        let result = package_one(&packager, &fx.dirs, "sample-ext", &fx.source_dir, "0.1.0")
            .await
            .unwrap();

        assert_eq!(result.plugin_id, "sample-ext");
        assert_eq!(result.metadata.version, "0.1.0");
        let names: Vec<_> = result.artifacts.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["archive.tar.gz", "manifest.json"]);

        let invocation = packager.last_invocation().unwrap();
        assert_eq!(invocation.source_dir, fx.source_dir);
        assert_eq!(invocation.output_dir, fx.dirs.output_dir);
    }

    #[tokio::test]
    async fn test_version_mismatch_names_both_versions() {
        let fx = fixture();
        let packager = FakePackager::producing("Sample", "1.2.1");

        let err = package_one(&packager, &fx.dirs, "sample-ext", &fx.source_dir, "1.2.0")
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::VersionMismatch { .. }));
        let message = err.to_string();
        assert!(message.contains("1.2.0"));
        assert!(message.contains("1.2.1"));
    }

    #[tokio::test]
    async fn test_legacy_manifest_is_rejected_before_packaging() {
        let fx = fixture();
        fs::write(fx.source_dir.join(LEGACY_MANIFEST_FILE), "{}").unwrap();
        fs::write(
            fx.source_dir.join(SOURCE_MANIFEST_FILE),
            "id = \"sample-ext\"\n",
        )
        .unwrap();
        let packager = FakePackager::producing("Sample", "0.1.0");

        let err = package_one(&packager, &fx.dirs, "sample-ext", &fx.source_dir, "0.1.0")
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::LegacyManifest { .. }));
        assert_eq!(packager.calls(), 0);
    }

    #[tokio::test]
    async fn test_identity_mismatch() {
        let fx = fixture();
        fs::write(
            fx.source_dir.join(SOURCE_MANIFEST_FILE),
            "id = \"other-ext\"\n",
        )
        .unwrap();
        let packager = FakePackager::producing("Sample", "0.1.0");

        let err = package_one(&packager, &fx.dirs, "sample-ext", &fx.source_dir, "0.1.0")
            .await
            .unwrap_err();

        match err {
            PublishError::IdentityMismatch { expected, actual } => {
                assert_eq!(expected, "sample-ext");
                assert_eq!(actual, "other-ext");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(packager.calls(), 0);
    }

    #[tokio::test]
    async fn test_warnings_are_surfaced_in_order() {
        let fx = fixture();
        let packager = FakePackager::producing("Sample", "0.1.0").with_stderr(
            "INFO compiling\n WARN first thing\nINFO done\n WARN second thing\n",
        );

        let result = package_one(&packager, &fx.dirs, "sample-ext", &fx.source_dir, "0.1.0")
            .await
            .unwrap();

        assert_eq!(
            result.warnings,
            vec![" WARN first thing".to_string(), " WARN second thing".to_string()]
        );
    }

    #[tokio::test]
    async fn test_non_zero_exit_fails() {
        let fx = fixture();
        let packager = FakePackager::failing(101, "error: could not compile");

        let err = package_one(&packager, &fx.dirs, "sample-ext", &fx.source_dir, "0.1.0")
            .await
            .unwrap_err();

        match err {
            PublishError::PackagerFailed { status, stderr } => {
                assert_eq!(status, "exit code 101");
                assert_eq!(stderr, "error: could not compile");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_reserved_display_name_fails() {
        let fx = fixture();
        let packager = FakePackager::producing("Khulnasoft Sample", "0.1.0");

        let err = package_one(&packager, &fx.dirs, "sample-ext", &fx.source_dir, "0.1.0")
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::PolicyViolation { .. }));
    }

    #[tokio::test]
    async fn test_missing_packager_binary() {
        let fx = fixture();
        let packager = ExternalPackager::new(
            fx.source_dir.join("does-not-exist"),
            &fx.source_dir,
            Duration::from_secs(5),
        );

        let err = package_one(&packager, &fx.dirs, "sample-ext", &fx.source_dir, "0.1.0")
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::PackagerFailed { .. }));
    }

    #[test]
    fn test_invocation_args() {
        let invocation = PackagerInvocation {
            scratch_dir: PathBuf::from("build/scratch"),
            source_dir: PathBuf::from("plugins/a"),
            output_dir: PathBuf::from("build/output/a"),
        };
        let args: Vec<_> = invocation
            .args()
            .into_iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            vec![
                "--scratch-dir",
                "build/scratch",
                "--source-dir",
                "plugins/a",
                "--output-dir",
                "build/output/a"
            ]
        );
    }

    #[cfg(unix)]
    mod external {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::time::Instant;

        fn script(fx: &Fixture, name: &str, body: &str) -> PathBuf {
            let path = fx.dirs.scratch_dir.join(name);
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn invocation(fx: &Fixture) -> PackagerInvocation {
            PackagerInvocation {
                scratch_dir: fx.dirs.scratch_dir.clone(),
                source_dir: fx.source_dir.clone(),
                output_dir: fx.dirs.output_dir.clone(),
            }
        }

        #[tokio::test]
        async fn test_slow_packager_times_out() {
            let fx = fixture();
            let binary = script(&fx, "slow-packager", "sleep 5");
            let packager = ExternalPackager::new(binary, &fx.source_dir, Duration::from_secs(1));

            let started = Instant::now();
            let err = packager.run(&invocation(&fx)).await.unwrap_err();

            assert!(matches!(err, PublishError::PackagerTimeout { seconds: 1 }));
            assert!(started.elapsed() < Duration::from_secs(4));
        }

        #[tokio::test]
        async fn test_packager_sees_only_path_and_log_filter() {
            let fx = fixture();
            let binary = script(&fx, "env-packager", "env");
            let packager = ExternalPackager::new(binary, &fx.source_dir, Duration::from_secs(10));

            let output = packager.run(&invocation(&fx)).await.unwrap();

            assert!(output.success());
            let names: Vec<&str> = output
                .stdout
                .lines()
                .filter_map(|line| line.split_once('=').map(|(name, _)| name))
                .collect();
            assert!(names.contains(&"RUST_LOG"));
            assert!(output.stdout.lines().any(|line| line == "RUST_LOG=info"));
            assert!(!names.contains(&"HOME"));
            // PWD, SHLVL and `_` are maintained by the shell itself
            for name in names {
                assert!(
                    ["PATH", "RUST_LOG", "PWD", "OLDPWD", "SHLVL", "_"].contains(&name),
                    "unexpected variable {name}"
                );
            }
        }

        #[tokio::test]
        async fn test_packager_runs_in_working_dir_with_args() {
            let fx = fixture();
            let binary = script(&fx, "echo-packager", "pwd\nprintf '%s\\n' \"$@\"\necho oops >&2\nexit 3");
            let packager = ExternalPackager::new(binary, &fx.source_dir, Duration::from_secs(10));

            let output = packager.run(&invocation(&fx)).await.unwrap();

            assert_eq!(output.exit_code, Some(3));
            assert_eq!(output.stderr, "oops\n");
            let lines: Vec<&str> = output.stdout.lines().collect();
            assert_eq!(
                fs::canonicalize(lines[0]).unwrap(),
                fs::canonicalize(&fx.source_dir).unwrap()
            );
            let expected: Vec<String> = invocation(&fx)
                .args()
                .into_iter()
                .map(|a| a.to_string_lossy().to_string())
                .collect();
            assert_eq!(lines[1..], expected[..]);
        }
    }
}
