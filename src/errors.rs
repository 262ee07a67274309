use thiserror::Error;

#[derive(Debug, Error)]
pub enum HdemError {
    #[error("Request was considered invalid due to error: {0}")]
    InvalidInput(String),
    #[error("Error while reading request document: {0}")]
    MalformedRequest(#[from] serde_json::Error),
    #[error("Error while writing out results: {0}")]
    FailureInOutput(#[from] anyhow::Error),
}
