use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{message}")]
    PolicyViolation { message: String },

    #[error("Failed to check out submodule {path}: {message}")]
    Checkout { path: PathBuf, message: String },

    #[error("The `extension.json` manifest format has been superseded by `extension.toml`: {path}")]
    LegacyManifest { path: PathBuf },

    #[error(
        "IDs in `plugins.toml` and `extension.toml` do not match:\n\nplugins.toml: {expected}\n extension.toml: {actual}"
    )]
    IdentityMismatch { expected: String, actual: String },

    #[error(
        "Incorrect version for extension {plugin_id} ({name})\n\nExpected version: {expected}\nActual version: {actual}"
    )]
    VersionMismatch {
        plugin_id: String,
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Packager exited with {status}: {stderr}")]
    PackagerFailed { status: String, stderr: String },

    #[error("Packager did not finish within {seconds}s")]
    PackagerTimeout { seconds: u64 },

    #[error("Malformed blob store key '{key}': {reason}")]
    MalformedKey { key: String, reason: String },

    #[error("Failed to list blob store objects: {message}")]
    StoreList { message: String },

    #[error("Failed to upload {key}: {message}")]
    Upload { key: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Git error: {0}")]
    Git(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PublishError>;

impl PublishError {
    pub fn policy(message: impl Into<String>) -> Self {
        Self::PolicyViolation {
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Parse { .. } => 2,
            Self::PolicyViolation { .. } => 3,
            Self::Checkout { .. } | Self::Git(_) => 4,
            Self::LegacyManifest { .. }
            | Self::IdentityMismatch { .. }
            | Self::VersionMismatch { .. }
            | Self::PackagerFailed { .. }
            | Self::PackagerTimeout { .. } => 5,
            Self::MalformedKey { .. } | Self::StoreList { .. } | Self::Upload { .. } => 6,
            _ => 1,
        }
    }
}
