//! LLM client module
//!
//! Defines the provider-agnostic generation traits, the Gemini
//! implementation, and a scripted mock used by tests.

pub mod client;
pub mod error;
pub mod gemini;
pub mod types;

pub use client::{ChatSession, GenerativeClient, mock};
pub use error::LlmError;
pub use gemini::GeminiClient;
pub use types::{GenerationRequest, GenerationResponse, GroundingSource, PromptPart};

use std::sync::Arc;

use crate::config::LlmConfig;

/// Build the live client from configuration
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn GenerativeClient>, LlmError> {
    Ok(Arc::new(GeminiClient::from_config(config)?))
}
