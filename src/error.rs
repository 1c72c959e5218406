use std::io;
use std::path::PathBuf;

/// Why an extraction, or one entry of it, failed.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("cannot open archive '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("cannot create destination '{path}': {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("entry '{entry}' has an unsafe path")]
    UnsafePath { entry: String },

    #[error("entry '{entry}' is not supported: {reason}")]
    Unsupported { entry: String, reason: String },

    #[error("cannot create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read entry '{entry}': {source}")]
    Read {
        entry: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("cannot start the extraction runtime: {0}")]
    Runtime(#[source] io::Error),
}

impl ExtractError {
    /// Whether this error stops the whole extraction regardless of policy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExtractError::Open { .. } | ExtractError::Runtime(_))
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
