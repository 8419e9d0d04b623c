//! Error types for Tolk.

use thiserror::Error;

/// Library-level error type for Tolk operations.
#[derive(Error, Debug)]
pub enum TolkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown or inactive engine: {0}")]
    InvalidEngine(String),

    #[error("Recognition job submission failed: {0}")]
    Submission(String),

    #[error("Recognition failed: {0}")]
    Recognition(String),

    #[error("Rate limited by rewriting model: {0}")]
    RateLimited(String),

    #[error("Request to external service failed: {0}")]
    Fetch(String),

    #[error("Invalid transcript status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Transcript not found: {0}")]
    TranscriptNotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Tolk operations.
pub type Result<T> = std::result::Result<T, TolkError>;
