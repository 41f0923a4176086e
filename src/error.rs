use thiserror::Error;

use crate::validate::VALIDATION_MESSAGE;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on slot {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("quota exceeded writing {key}: {needed} bytes, {limit} allowed")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("imported JSON must be an object")]
    NotAnObject,

    #[error("imported JSON does not describe an invoice: {0}")]
    InvalidDocument(#[source] serde_json::Error),

    #[error("unsupported file {0}: expected a .json file")]
    UnsupportedFile(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("PDF compilation failed: {0}")]
    Compile(String),

    #[error("share failed: {0}")]
    Share(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access settings at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to write settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Errors surfaced by editor workflows. Each one maps to a single
/// user-facing message; none of them leaves the form half-written.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("{}", VALIDATION_MESSAGE)]
    Validation,

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("no history entry with id {0}")]
    HistoryNotFound(i64),
}
