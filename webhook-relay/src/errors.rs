use thiserror::Error;

/// Errors raised while serving the relay's HTTP endpoints
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to read request body: {0}")]
    RequestBodyError(String),

    #[error("Request body is empty")]
    EmptyBody,

    #[error("Failed to decode request body: {0}")]
    DecodeError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
