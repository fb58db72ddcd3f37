use thiserror::Error;

/// Errors raised by the external platform collaborators (data store,
/// time rules, analysis lookup) and by the parsers in this crate.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid time '{0}'")]
    InvalidTime(String),

    #[error("Invalid duration '{0}'")]
    InvalidDuration(String),

    #[error("{0}")]
    Other(String),
}

/// Result alias for collaborator calls.
pub type Result<T> = std::result::Result<T, PlatformError>;
