//! Error types for storyvault

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No file uploaded")]
    NoFile,

    #[error("Invalid file type: {mime_type} (extension: {extension})")]
    InvalidFileType {
        mime_type: String,
        extension: String,
    },

    #[error("File too large: limit is {limit} bytes")]
    FileTooLarge { limit: u64 },

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Invalid range header: {0}")]
    InvalidRange(String),

    #[error("Multiple ranges are not supported")]
    MultipleRanges,

    #[error("Range not satisfiable for a file of {size} bytes")]
    RangeNotSatisfiable { size: u64 },

    #[error("Path escapes the samples directory: {0}")]
    PathTraversal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn invalid_range(msg: impl Into<String>) -> Self {
        Error::InvalidRange(msg.into())
    }
}
