//! Error types for the AutoML client

/// Errors that can occur while talking to the AutoML backend
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Backend returned status {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No active session; upload a dataset first or pass --session")]
    NoSession,

    #[error("Backend at {0} did not wake up")]
    BackendAsleep(String),
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
