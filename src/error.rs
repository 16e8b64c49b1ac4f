//! Error types for datapipe.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    // Endpoint binding state errors
    #[error("Source endpoint is already bound")]
    SourceAlreadyBound,

    #[error("Sink endpoint is already bound")]
    SinkAlreadyBound,

    // Stage specification errors
    #[error("Stage settings carry no transform function")]
    MissingStageFunction,

    // Background context errors
    #[error("No background execution context available: {attempts}")]
    ContextUnavailable { attempts: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, PipelineError>;
