//! Errors!
//!
//! One enum for the whole crate: each variant corresponds to one named
//! error kind (`ConfigError`, `ValidationError`, `StorageError`,
//! `IntegrityError`, `FilesystemError`, `CoordinationError`), plus
//! `#[error(transparent)]` wraps for the underlying library errors that
//! naturally bubble up through them.

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// An alias for the common Result type for this crate.
pub type PullDeployResult<T> = std::result::Result<T, PullDeployError>;

/// Errors PullDeploy can produce.
#[derive(Debug, Error, Diagnostic)]
pub enum PullDeployError {
    /// Missing, unparseable, or insecure configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid arguments or an attempted invariant-violating mutation of
    /// the repository index.
    #[error("validation error: {0}")]
    Validation(String),

    /// A transient or permanent I/O failure against the blob store.
    #[error("storage error on {path}: {source}")]
    Storage {
        /// The storage-relative path the operation was against.
        path: String,
        /// The underlying cause.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An HMAC mismatch between a downloaded artifact and its sidecar.
    #[error("integrity error: artifact {version} expected hmac {expected} but computed {actual}")]
    Integrity {
        /// The version whose artifact failed verification.
        version: String,
        /// The HMAC read from the `.hmac` sidecar, hex-encoded.
        expected: String,
        /// The HMAC recomputed from the artifact bytes, hex-encoded.
        actual: String,
    },

    /// mkdir/chown/symlink failure against the local deployment tree.
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        /// The local path the operation was against.
        path: Utf8PathBuf,
        /// The underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// Coordination-service session loss or protocol failure.
    #[error("coordination error: {0}")]
    Coordination(String),

    /// random i/o error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// random serde_json error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// random serde_yaml error
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl PullDeployError {
    /// Construct a `ConfigError` from a displayable cause.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Construct a `ValidationError` from a displayable cause.
    pub fn validation(msg: impl std::fmt::Display) -> Self {
        Self::Validation(msg.to_string())
    }

    /// Construct a `CoordinationError` from a displayable cause.
    pub fn coordination(msg: impl std::fmt::Display) -> Self {
        Self::Coordination(msg.to_string())
    }

    /// Construct a `StorageError`, boxing the underlying cause.
    pub fn storage(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            path: path.into(),
            source: Box::new(source),
        }
    }
}
