//! Grounded chat with the reading companion
//!
//! After reports are displayed the user can talk to "Aura" about them.
//! The orchestrator owns at most one live session; the session's system
//! instruction carries the report summaries and archetype tags so every
//! reply is grounded in this run's readings.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::llm::{ChatSession, GenerativeClient, LlmError};
use crate::prompts::PromptBuilder;
use crate::wizard::Report;

/// First user turn; the model's reply to it is the greeting shown in chat
pub const CHAT_BOOTSTRAP: &str = "Hello Aura, I'm ready to discuss my reports.";

/// Who authored a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One entry in the chat transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text)
    }

    fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Chat failure modes
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Chat session not active. Please try ending the chat and starting a new one.")]
    NotActive,

    #[error("Failed to start chat session. {0}")]
    Start(#[source] LlmError),

    #[error("Failed to send message. {0}")]
    Send(#[source] LlmError),

    #[error("Your chat session seems to have ended or encountered an issue. Please start a new chat. (Original: {0})")]
    SessionInvalidated(#[source] LlmError),

    #[error("Failed to render chat context: {0}")]
    Template(#[from] handlebars::RenderError),
}

/// Owns the live chat session, if any
pub struct ChatOrchestrator {
    llm: Arc<dyn GenerativeClient>,
    prompts: PromptBuilder,
    session: Option<Box<dyn ChatSession>>,
}

impl ChatOrchestrator {
    pub fn new(llm: Arc<dyn GenerativeClient>) -> Self {
        Self {
            llm,
            prompts: PromptBuilder::new(),
            session: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Start a session grounded in the given reports and return the greeting
    ///
    /// Reports should arrive with the integrated report first so it leads
    /// the summary. A failure anywhere leaves no session behind.
    pub async fn start(
        &mut self,
        reports: &[Report],
        tags: &[String],
        user_name: &str,
        main_question: &str,
    ) -> Result<String, ChatError> {
        info!(reports = reports.len(), "chat start: called");
        let system = self.prompts.chat_system(reports, tags, user_name, main_question)?;

        let mut session = self.llm.start_chat(system).await.map_err(ChatError::Start)?;

        match session.send(CHAT_BOOTSTRAP).await {
            Ok(greeting) => {
                self.session = Some(session);
                Ok(greeting)
            }
            Err(e) => {
                warn!(error = %e, "chat start: bootstrap send failed");
                Err(ChatError::Start(e))
            }
        }
    }

    /// Send one user message and return the reply
    pub async fn send(&mut self, message: &str) -> Result<String, ChatError> {
        debug!(len = message.len(), "chat send: called");
        let session = self.session.as_mut().ok_or(ChatError::NotActive)?;

        match session.send(message).await {
            Ok(reply) => Ok(reply),
            Err(e) if e.invalidates_session() => {
                warn!(error = %e, "chat send: session invalidated");
                self.session = None;
                Err(ChatError::SessionInvalidated(e))
            }
            Err(e) => Err(ChatError::Send(e)),
        }
    }

    /// Drop the session, if any
    pub fn end(&mut self) {
        debug!(was_active = self.is_active(), "chat end: called");
        self.session = None;
    }
}
