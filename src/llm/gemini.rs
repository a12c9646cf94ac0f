//! Gemini generateContent API client
//!
//! Implements the GenerativeClient trait against Google's v1beta REST
//! endpoint. Chat sessions replay the accumulated turn history with the
//! system instruction on every send - the REST API itself is stateless.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ChatSession, GenerationRequest, GenerationResponse, GenerativeClient, GroundingSource, LlmError, PromptPart};
use crate::config::LlmConfig;

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Gemini API client
pub struct GeminiClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
}

impl GeminiClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, "from_config: called");
        let api_key = config.get_api_key()?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.clone(),
            http,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Convert prompt parts to Gemini content parts
fn convert_parts(parts: &[PromptPart]) -> Vec<serde_json::Value> {
    parts
        .iter()
        .map(|part| match part {
            PromptPart::Text(text) => serde_json::json!({ "text": text }),
            PromptPart::InlineImage { mime_type, data_base64 } => serde_json::json!({
                "inline_data": { "mime_type": mime_type, "data": data_base64 }
            }),
        })
        .collect()
}

/// Build the request body for a single-turn generation call
fn build_request_body(request: &GenerationRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "contents": [{ "role": "user", "parts": convert_parts(&request.parts) }],
    });

    if request.enable_search {
        body["tools"] = serde_json::json!([{ "google_search": {} }]);
    }
    if request.json_response {
        body["generationConfig"] = serde_json::json!({ "responseMimeType": "application/json" });
    }

    body
}

/// POST a generateContent body, with retry on transient failures
async fn post_generate(
    http: &Client,
    url: &str,
    api_key: &str,
    body: &serde_json::Value,
) -> Result<GenerationResponse, LlmError> {
    let mut last_error = None;

    for attempt in 0..=MAX_RETRIES {
        if attempt > 0 {
            let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
            warn!(attempt, backoff_ms = backoff, "post_generate: retrying after transient error");
            tokio::time::sleep(Duration::from_millis(backoff)).await;
        }

        let response = match http
            .post(url)
            .header("x-goog-api-key", api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!(attempt, error = %e, "post_generate: network error");
                last_error = Some(LlmError::Network(e));
                continue;
            }
        };

        let status = response.status().as_u16();

        if is_retryable_status(status) && attempt < MAX_RETRIES {
            let text = response.text().await.unwrap_or_default();
            debug!(attempt, status, "post_generate: retryable error");
            last_error = Some(LlmError::ApiError { status, message: text });
            continue;
        }

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            debug!(%status, "post_generate: API error");
            return Err(LlmError::ApiError { status, message: text });
        }

        let api_response: GeminiResponse = response.json().await?;
        return parse_response(api_response);
    }

    Err(last_error.unwrap_or_else(|| LlmError::InvalidResponse("Max retries exceeded".to_string())))
}

/// Extract text and grounding sources from the API response
fn parse_response(api_response: GeminiResponse) -> Result<GenerationResponse, LlmError> {
    let candidate = api_response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("Response contained no candidates".to_string()))?;

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(LlmError::InvalidResponse("Response contained no text".to_string()));
    }

    let sources = candidate
        .grounding_metadata
        .map(|gm| {
            gm.grounding_chunks
                .into_iter()
                .filter_map(|chunk| chunk.web)
                .filter_map(|web| {
                    web.uri.map(|uri| GroundingSource {
                        uri,
                        title: web.title.unwrap_or_default(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(GenerationResponse { text, sources })
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        debug!(model = %self.model, parts = request.parts.len(), search = request.enable_search, "generate: called");
        let body = build_request_body(&request);
        post_generate(&self.http, &self.endpoint(), &self.api_key, &body).await
    }

    async fn start_chat(&self, system_instruction: String) -> Result<Box<dyn ChatSession>, LlmError> {
        debug!(model = %self.model, "start_chat: called");
        Ok(Box::new(GeminiChatSession {
            http: self.http.clone(),
            url: self.endpoint(),
            api_key: self.api_key.clone(),
            system_instruction,
            history: Vec::new(),
        }))
    }
}

/// One open Gemini conversation
///
/// Holds the turn history locally and replays it on each send.
struct GeminiChatSession {
    http: Client,
    url: String,
    api_key: String,
    system_instruction: String,
    history: Vec<serde_json::Value>,
}

#[async_trait]
impl ChatSession for GeminiChatSession {
    async fn send(&mut self, message: &str) -> Result<String, LlmError> {
        debug!(turns = self.history.len(), "send: called");
        self.history
            .push(serde_json::json!({ "role": "user", "parts": [{ "text": message }] }));

        let body = serde_json::json!({
            "system_instruction": { "parts": [{ "text": self.system_instruction }] },
            "contents": self.history,
        });

        match post_generate(&self.http, &self.url, &self.api_key, &body).await {
            Ok(response) => {
                self.history
                    .push(serde_json::json!({ "role": "model", "parts": [{ "text": response.text }] }));
                Ok(response.text)
            }
            Err(e) => {
                // Drop the unanswered turn so a retry replays a consistent history
                self.history.pop();
                Err(e)
            }
        }
    }
}

// Gemini API response types

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(rename = "groundingMetadata")]
    grounding_metadata: Option<GeminiGroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiGroundingMetadata {
    #[serde(rename = "groundingChunks", default)]
    grounding_chunks: Vec<GeminiGroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GeminiGroundingChunk {
    web: Option<GeminiWebSource>,
}

#[derive(Debug, Deserialize)]
struct GeminiWebSource {
    uri: Option<String>,
    title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_body_basic() {
        let request = GenerationRequest::text("Analyze this birth date");
        let body = build_request_body(&request);

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Analyze this birth date");
        assert!(body.get("tools").is_none());
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_build_request_body_with_search_and_image() {
        let request = GenerationRequest::text("Read this palm")
            .with_image("image/jpeg", "QUJD")
            .with_search();
        let body = build_request_body(&request);

        assert_eq!(body["contents"][0]["parts"][1]["inline_data"]["mime_type"], "image/jpeg");
        assert!(body["tools"].is_array());
    }

    #[test]
    fn test_build_request_body_json_response() {
        let request = GenerationRequest::text("tags").expect_json();
        let body = build_request_body(&request);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_parse_response_text_and_sources() {
        let raw = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Your reading: " }, { "text": "all is well" }] },
                "groundingMetadata": {
                    "groundingChunks": [
                        { "web": { "uri": "https://a.example", "title": "A" } },
                        { "web": null },
                        { "web": { "uri": null, "title": "no uri" } }
                    ]
                }
            }]
        });
        let parsed: GeminiResponse = serde_json::from_value(raw).unwrap();
        let response = parse_response(parsed).unwrap();
        assert_eq!(response.text, "Your reading: all is well");
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].uri, "https://a.example");
    }

    #[test]
    fn test_parse_response_empty_is_error() {
        let parsed: GeminiResponse = serde_json::from_value(serde_json::json!({ "candidates": [] })).unwrap();
        assert!(parse_response(parsed).is_err());
    }

    #[test]
    fn test_is_retryable_status() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
    }
}
