//! Request/response types for the generation capability
//!
//! These model Gemini's generateContent API but stay provider-agnostic:
//! a prompt is one or more parts (text, inline image), plus flags for web
//! search grounding and JSON-typed responses.

use serde::{Deserialize, Serialize};

/// One part of a prompt payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPart {
    Text(String),
    InlineImage {
        /// e.g. "image/jpeg"
        mime_type: String,
        /// Base64-encoded image bytes
        data_base64: String,
    },
}

/// A single generation request - everything needed for one call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Prompt parts, in order
    pub parts: Vec<PromptPart>,

    /// Enable the provider's web search tool for grounding
    pub enable_search: bool,

    /// Ask for an application/json response body
    pub json_response: bool,
}

impl GenerationRequest {
    /// Plain text prompt
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            parts: vec![PromptPart::Text(prompt.into())],
            enable_search: false,
            json_response: false,
        }
    }

    /// Append an inline image part
    pub fn with_image(mut self, mime_type: impl Into<String>, data_base64: impl Into<String>) -> Self {
        self.parts.push(PromptPart::InlineImage {
            mime_type: mime_type.into(),
            data_base64: data_base64.into(),
        });
        self
    }

    /// Enable web search grounding
    pub fn with_search(mut self) -> Self {
        self.enable_search = true;
        self
    }

    /// Request a JSON-typed response
    pub fn expect_json(mut self) -> Self {
        self.json_response = true;
        self
    }

    /// Concatenated text parts, for logging and tests
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                PromptPart::Text(text) => Some(text.as_str()),
                PromptPart::InlineImage { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A web citation returned alongside generated text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub uri: String,
    pub title: String,
}

/// Response from a generation request
#[derive(Debug, Clone, Default)]
pub struct GenerationResponse {
    /// Generated text
    pub text: String,

    /// Zero or more web citations backing the text
    pub sources: Vec<GroundingSource>,
}

impl GenerationResponse {
    /// Text-only response, for tests and simple paths
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let req = GenerationRequest::text("read my palm")
            .with_image("image/jpeg", "QUJD")
            .with_search();
        assert_eq!(req.parts.len(), 2);
        assert!(req.enable_search);
        assert!(!req.json_response);
        assert_eq!(req.text_content(), "read my palm");
    }

    #[test]
    fn test_expect_json() {
        let req = GenerationRequest::text("tags please").expect_json();
        assert!(req.json_response);
    }
}
