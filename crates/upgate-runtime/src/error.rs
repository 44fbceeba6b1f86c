//! Runtime error types.

use thiserror::Error;

/// Errors that can occur while running the transport or its plumbing.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding reply: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
