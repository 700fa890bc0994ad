//! Application-level errors (wraps domain errors)

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::DomainError;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("unsupported record format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("cannot parse records in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("tree depth {depth} exceeds render limit {limit}")]
    RenderDepth { depth: usize, limit: usize },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
