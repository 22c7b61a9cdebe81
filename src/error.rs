//! Error types for the multi-agent chat service

use thiserror::Error;

/// Result type alias for chat operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {

    // =============================
    // User-facing Validation
    // =============================

    #[error("Please enter your OpenAI API key to proceed.")]
    MissingCredential,

    #[error("Please enter a query before clicking 'Run Agent'.")]
    EmptyQuery,

    #[error("An agent is already processing a query for this session.")]
    Busy,

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    // =============================
    // Collaborator Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Template error: {0}")]
    TemplateError(#[from] minijinja::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AppError {
    /// Validation failures are shown as warnings and leave session state untouched.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            AppError::MissingCredential | AppError::EmptyQuery | AppError::Busy
        )
    }
}
