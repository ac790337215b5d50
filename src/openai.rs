//! OpenAI client configuration with sensible defaults.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for OpenAI API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create an OpenAI client with configured timeout.
///
/// Uses a 5-minute timeout by default to prevent hung API calls.
pub fn create_client() -> Client<OpenAIConfig> {
    create_client_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an OpenAI client with a custom timeout.
pub fn create_client_with_timeout(timeout: Duration) -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client");

    Client::with_config(OpenAIConfig::default()).with_http_client(http_client)
}

/// Check if the OpenAI API key is configured.
pub fn is_api_key_configured() -> bool {
    std::env::var("OPENAI_API_KEY").is_ok()
}

/// Map an OpenAI API failure onto the error taxonomy so the retry driver
/// can tell transient service trouble from real failures.
pub fn classify_api_error(context: &str, message: impl std::fmt::Display) -> crate::error::SkribentError {
    use crate::error::SkribentError;

    let message = message.to_string();
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") {
        SkribentError::RateLimited(format!("{}: {}", context, message))
    } else if lower.contains("timed out") || lower.contains("timeout") {
        SkribentError::Timeout(format!("{}: {}", context, message))
    } else if lower.contains("500")
        || lower.contains("502")
        || lower.contains("503")
        || lower.contains("unavailable")
        || lower.contains("connection")
        || lower.contains("overloaded")
    {
        SkribentError::ServiceUnavailable(format!("{}: {}", context, message))
    } else {
        SkribentError::OpenAI(format!("{}: {}", context, message))
    }
}
