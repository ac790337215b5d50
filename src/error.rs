//! Error types for Skribent.

use thiserror::Error;

/// Library-level error type for Skribent operations.
#[derive(Error, Debug)]
pub enum SkribentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Video not found or unavailable: {0}")]
    VideoNotFound(String),

    #[error("Rate limited by upstream service: {0}")]
    RateLimited(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Upstream service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Partial or corrupt download: {0}")]
    PartialDownload(String),

    #[error("Unsupported language '{language}': {message}")]
    UnsupportedLanguage { language: String, message: String },

    #[error("Generated output failed quality validation: {0}")]
    Quality(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Media acquisition failed: {0}")]
    Acquisition(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Content analysis failed: {0}")]
    Analysis(String),

    #[error("Article generation failed: {0}")]
    Generation(String),

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

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unit of work cancelled before stage '{0}'")]
    Cancelled(String),
}

impl SkribentError {
    /// Whether the operation that produced this error is worth retrying
    /// with backoff. Fatal errors (missing video, unsupported language,
    /// integrity violations) must never be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            SkribentError::RateLimited(_)
            | SkribentError::Timeout(_)
            | SkribentError::ServiceUnavailable(_)
            | SkribentError::PartialDownload(_) => true,
            SkribentError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Quality errors get their own bounded retry loop with adjusted
    /// generation parameters rather than plain backoff.
    pub fn is_quality(&self) -> bool {
        matches!(self, SkribentError::Quality(_))
    }
}

/// Result type alias for Skribent operations.
pub type Result<T> = std::result::Result<T, SkribentError>;
