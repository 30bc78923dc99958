use thiserror::Error;

/// Top-level error type for Atende.
#[derive(Debug, Error)]
pub enum AtendeError {
    /// Error talking to the messaging gateway (Evolution API).
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Error from the LLM or transcription provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// Storage error.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
