//! GenerativeClient and ChatSession trait definitions

use async_trait::async_trait;

use super::{GenerationRequest, GenerationResponse, LlmError};

/// Stateless generation capability - each call is independent
///
/// This is the core abstraction for the report pipeline. Every call carries
/// its full prompt; no conversation state is kept between calls.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Send a single generation request and wait for the full response
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;

    /// Open a conversational session seeded with a system-level context
    ///
    /// The returned session owns the conversation; dropping it ends the
    /// conversation. At most one session should be live per wizard run, but
    /// that discipline belongs to the caller, not this trait.
    async fn start_chat(&self, system_instruction: String) -> Result<Box<dyn ChatSession>, LlmError>;
}

/// One open conversation with the model
#[async_trait]
pub trait ChatSession: Send {
    /// Append a user turn and return the assistant's reply text
    async fn send(&mut self, message: &str) -> Result<String, LlmError>;
}

/// Mock client for unit and integration tests
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Scripted mock of [`GenerativeClient`]
    ///
    /// Generation responses are consumed in FIFO order; every request is
    /// recorded so tests can assert on prompt content and flags. Chat
    /// sessions pop from their own queue of scripted reply lists.
    #[derive(Default)]
    pub struct MockGenerativeClient {
        generate_queue: Mutex<VecDeque<Result<GenerationResponse, LlmError>>>,
        chat_queue: Mutex<VecDeque<Result<Vec<String>, LlmError>>>,
        requests: Mutex<Vec<GenerationRequest>>,
        chat_contexts: Arc<Mutex<Vec<String>>>,
    }

    impl MockGenerativeClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a plain text generation response
        pub fn push_text(&self, text: impl Into<String>) {
            self.push_response(GenerationResponse::text_only(text));
        }

        /// Queue a full generation response
        pub fn push_response(&self, response: GenerationResponse) {
            self.generate_queue.lock().unwrap().push_back(Ok(response));
        }

        /// Queue a generation failure
        pub fn push_error(&self, error: LlmError) {
            self.generate_queue.lock().unwrap().push_back(Err(error));
        }

        /// Queue a chat session whose sends return the given replies in order
        ///
        /// The first reply answers the bootstrap turn (the greeting).
        pub fn push_chat_session(&self, replies: Vec<&str>) {
            self.chat_queue
                .lock()
                .unwrap()
                .push_back(Ok(replies.into_iter().map(String::from).collect()));
        }

        /// Queue a chat start failure
        pub fn push_chat_failure(&self, error: LlmError) {
            self.chat_queue.lock().unwrap().push_back(Err(error));
        }

        /// Requests seen so far, in call order
        pub fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().unwrap().clone()
        }

        /// System instructions of every session started so far
        pub fn chat_contexts(&self) -> Vec<String> {
            self.chat_contexts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerativeClient for MockGenerativeClient {
        async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
            self.requests.lock().unwrap().push(request);
            self.generate_queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::InvalidResponse("No more mock responses".to_string())))
        }

        async fn start_chat(&self, system_instruction: String) -> Result<Box<dyn ChatSession>, LlmError> {
            self.chat_contexts.lock().unwrap().push(system_instruction);
            let replies = self
                .chat_queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::InvalidResponse("No more mock chat sessions".to_string())))?;
            Ok(Box::new(MockChatSession { replies: replies.into() }))
        }
    }

    /// Scripted mock session
    pub struct MockChatSession {
        replies: VecDeque<String>,
    }

    #[async_trait]
    impl ChatSession for MockChatSession {
        async fn send(&mut self, _message: &str) -> Result<String, LlmError> {
            self.replies.pop_front().ok_or(LlmError::ApiError {
                status: 404,
                message: "conversation not found".to_string(),
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_returns_queued_responses() {
            let client = MockGenerativeClient::new();
            client.push_text("first");
            client.push_text("second");

            let r1 = client.generate(GenerationRequest::text("a")).await.unwrap();
            let r2 = client.generate(GenerationRequest::text("b")).await.unwrap();
            assert_eq!(r1.text, "first");
            assert_eq!(r2.text, "second");
            assert_eq!(client.requests().len(), 2);
        }

        #[tokio::test]
        async fn test_mock_errors_when_exhausted() {
            let client = MockGenerativeClient::new();
            let result = client.generate(GenerationRequest::text("a")).await;
            assert!(result.is_err());
        }

        #[tokio::test]
        async fn test_mock_chat_session_replies_in_order() {
            let client = MockGenerativeClient::new();
            client.push_chat_session(vec!["hello", "goodbye"]);

            let mut session = client.start_chat("system context".to_string()).await.unwrap();
            assert_eq!(session.send("hi").await.unwrap(), "hello");
            assert_eq!(session.send("bye").await.unwrap(), "goodbye");
            // Exhausted session looks like an invalidated conversation
            let err = session.send("more").await.unwrap_err();
            assert!(err.invalidates_session());

            assert_eq!(client.chat_contexts(), vec!["system context".to_string()]);
        }
    }
}
