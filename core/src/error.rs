//! Error types for flux operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout flux-core
pub type Result<T> = std::result::Result<T, FluxError>;

/// All error conditions surfaced by the flux core
#[derive(Debug, Error)]
pub enum FluxError {
    /// Preprocessing config is invalid or cannot be canonicalized
    #[error("Invalid config: {message}")]
    Config { message: String },

    /// Lock could not be acquired within the configured timeout
    #[error("Could not acquire lock '{name}' within {timeout_secs:.1}s")]
    LockTimeout { name: String, timeout_secs: f64 },

    /// Unexpected failure while manipulating a lock marker
    #[error("Lock '{name}' failed: {message}")]
    Lock { name: String, message: String },

    /// Requested version hash or tag does not exist
    #[error("Version or tag not found: '{reference}'")]
    NotFound { reference: String },

    /// A hash prefix matched more than one stored version
    #[error("Ambiguous reference '{prefix}' matches {count} versions")]
    AmbiguousReference { prefix: String, count: usize },

    /// Archive contents do not reproduce the hashes they claim
    #[error("Corrupt archive {path:?}: {message}")]
    CorruptArchive { path: PathBuf, message: String },

    /// A stored version's artifacts no longer reproduce its identity
    #[error("Integrity check failed for version '{reference}': {message}")]
    Integrity { reference: String, message: String },

    /// Input data is malformed (e.g. missing the required `text` column)
    #[error("Invalid data format: {message}")]
    DataFormat { message: String },

    /// A preprocessing step failed at runtime
    #[error("Preprocessing step '{step}' failed: {message}")]
    Preprocessing { step: String, message: String },

    /// Path is not a flux repository
    #[error("Not a flux repository: {path:?} (run 'flux init' first)")]
    RepositoryNotFound { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl FluxError {
    pub fn config(message: impl Into<String>) -> Self {
        FluxError::Config {
            message: message.into(),
        }
    }

    pub fn data_format(message: impl Into<String>) -> Self {
        FluxError::DataFormat {
            message: message.into(),
        }
    }

    pub fn preprocessing(step: impl Into<String>, message: impl Into<String>) -> Self {
        FluxError::Preprocessing {
            step: step.into(),
            message: message.into(),
        }
    }

    pub fn not_found(reference: impl Into<String>) -> Self {
        FluxError::NotFound {
            reference: reference.into(),
        }
    }

    pub fn corrupt_archive(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        FluxError::CorruptArchive {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn integrity(reference: impl Into<String>, message: impl Into<String>) -> Self {
        FluxError::Integrity {
            reference: reference.into(),
            message: message.into(),
        }
    }
}
