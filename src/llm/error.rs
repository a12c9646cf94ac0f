//! LLM error types

use thiserror::Error;

/// Errors that can occur talking to the generative endpoint
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key not found. Set the {0} environment variable.")]
    MissingApiKey(String),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Check if this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::ApiError { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            LlmError::Network(_) => true,
            LlmError::MissingApiKey(_) | LlmError::InvalidResponse(_) | LlmError::Json(_) => false,
        }
    }

    /// Check if this error means an open chat session is no longer usable
    ///
    /// The endpoint rejects a broken conversation replay with a 4xx; once that
    /// happens, further sends through the same session will keep failing, so
    /// the orchestrator drops the handle.
    pub fn invalidates_session(&self) -> bool {
        matches!(self, LlmError::ApiError { status: 400 | 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(
            LlmError::ApiError {
                status: 503,
                message: "overloaded".to_string()
            }
            .is_retryable()
        );
        assert!(
            LlmError::ApiError {
                status: 429,
                message: "rate limited".to_string()
            }
            .is_retryable()
        );
        assert!(
            !LlmError::ApiError {
                status: 400,
                message: "bad request".to_string()
            }
            .is_retryable()
        );
        assert!(!LlmError::InvalidResponse("empty".to_string()).is_retryable());
        assert!(!LlmError::MissingApiKey("GEMINI_API_KEY".to_string()).is_retryable());
    }

    #[test]
    fn test_invalidates_session() {
        assert!(
            LlmError::ApiError {
                status: 404,
                message: "conversation not found".to_string()
            }
            .invalidates_session()
        );
        assert!(
            !LlmError::ApiError {
                status: 500,
                message: "server error".to_string()
            }
            .invalidates_session()
        );
        assert!(!LlmError::InvalidResponse("empty".to_string()).invalidates_session());
    }
}
