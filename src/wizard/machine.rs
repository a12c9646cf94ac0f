//! Wizard step machine
//!
//! Owns the session state and every transition between steps. The terminal
//! layer only ever calls these methods and repaints from the state; all
//! validation, sequencing, and failure routing lives here.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{BackendClient, ReadingBundle, SaveStatus, build_bundle};
use crate::chat::{ChatMessage, ChatOrchestrator};
use crate::llm::GenerativeClient;
use crate::methods::{ALL_METHODS, Method, MethodInput};
use crate::pipeline::ReportPipeline;
use crate::wizard::state::{Step, WizardState};

/// Result of a "next" press on the input form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextOutcome {
    /// Validation failed; cursor unchanged, error set
    Stay,
    /// Moved to the next method's form
    Advanced,
    /// All inputs collected; caller should run report generation
    Complete,
}

/// The divination wizard
pub struct Wizard {
    pub state: WizardState,
    pipeline: ReportPipeline,
    chat: ChatOrchestrator,
    backend: Option<Arc<BackendClient>>,
    model: String,
    save_rx: Option<watch::Receiver<SaveStatus>>,
    last_bundle: Option<ReadingBundle>,
}

impl Wizard {
    pub fn new(llm: Arc<dyn GenerativeClient>, backend: Option<Arc<BackendClient>>, model: impl Into<String>) -> Self {
        Self {
            state: WizardState::new(),
            pipeline: ReportPipeline::new(llm.clone()),
            chat: ChatOrchestrator::new(llm),
            backend,
            model: model.into(),
            save_rx: None,
            last_bundle: None,
        }
    }

    /// Record name and question, then move to method selection
    pub fn submit_demographics(&mut self, name: &str, question: &str) {
        debug!("submit_demographics: called");
        if name.trim().is_empty() {
            self.state.set_error("Please enter your name.");
            return;
        }
        if question.trim().is_empty() {
            self.state.set_error("Please enter your question or area of interest.");
            return;
        }
        self.state.user_name = name.trim().to_string();
        self.state.main_question = question.trim().to_string();
        self.state.clear_error();
        self.state.step = Step::MethodSelection;
    }

    pub fn back_to_demographics(&mut self) {
        self.state.clear_error();
        self.state.step = Step::Demographics;
    }

    /// Toggle one method on or off
    ///
    /// Deselecting discards any input already collected for that method.
    pub fn toggle_method(&mut self, method: Method) {
        debug!(%method, "toggle_method: called");
        if self.state.selected.contains(&method) {
            self.state.selected.retain(|m| *m != method);
            self.state.inputs.remove(&method);
            // Existing reports no longer reflect the selection
            self.state.individual_reports.clear();
            self.state.integrated_report = None;
            self.state.archetype_tags.clear();
            self.state.sources.clear();
        } else {
            self.state.selected.push(method);
            // Keep registry order regardless of click order
            self.state.selected.sort();
        }
    }

    /// Move from selection to the first input form
    pub fn proceed_to_inputs(&mut self) {
        debug!(selected = self.state.selected.len(), "proceed_to_inputs: called");
        if self.state.selected.is_empty() {
            self.state.set_error("Please select at least one divination method.");
            return;
        }

        for method in ALL_METHODS {
            if self.state.selected.contains(&method) {
                self.state
                    .inputs
                    .entry(method)
                    .or_insert_with(|| MethodInput::empty_for(method));
            }
        }
        self.state.input_cursor = 0;
        self.state.clear_error();
        self.state.step = Step::InputForm;
    }

    /// Replace the input for the method the new record belongs to
    ///
    /// When Life Path and Astrology are both selected, the birth date on the
    /// just-edited form is copied onto the other, cleared or not, so the two
    /// always agree.
    pub fn update_input(&mut self, input: MethodInput) {
        let method = input.method();
        debug!(%method, "update_input: called");
        let dob = input.date_of_birth().map(String::from);
        self.state.inputs.insert(method, input);

        let counterpart = match method {
            Method::LifePathNumber => Method::Astrology,
            Method::Astrology => Method::LifePathNumber,
            _ => return,
        };
        if let Some(dob) = dob
            && let Some(other) = self.state.inputs.get_mut(&counterpart)
        {
            debug!(%counterpart, "update_input: syncing date of birth");
            other.set_date_of_birth(&dob);
        }
    }

    /// Validate the current input and advance
    pub fn next_input(&mut self) -> NextOutcome {
        let Some(method) = self.state.current_method() else {
            self.state.set_error("No method selected. Please re-select methods.");
            self.state.step = Step::MethodSelection;
            return NextOutcome::Stay;
        };

        let input = &self.state.inputs[&method];
        if let Err(message) = input.validate() {
            debug!(%method, %message, "next_input: validation failed");
            self.state.set_error(message);
            return NextOutcome::Stay;
        }

        self.state.clear_error();
        if self.state.input_cursor + 1 < self.state.inputs.len() {
            self.state.input_cursor += 1;
            NextOutcome::Advanced
        } else {
            NextOutcome::Complete
        }
    }

    /// Step back through the forms, or out to method selection
    pub fn previous_input(&mut self) {
        self.state.clear_error();
        if self.state.input_cursor > 0 {
            self.state.input_cursor -= 1;
        } else {
            self.state.step = Step::MethodSelection;
        }
    }

    /// Jump from the report view back to the last input form for edits
    pub fn edit_inputs(&mut self) {
        debug!("edit_inputs: called");
        self.state.clear_error();
        self.state.input_cursor = self.state.inputs.len().saturating_sub(1);
        self.state.step = Step::InputForm;
    }

    /// Run the full report pipeline and route the outcome
    pub async fn generate_reports(&mut self) {
        info!(methods = self.state.inputs.len(), "generate_reports: called");
        if self.state.inputs.is_empty() {
            self.state.set_error("No methods selected for analysis.");
            self.state.step = Step::MethodSelection;
            return;
        }

        // Revalidate everything; an edit may have invalidated an earlier form
        let failure = self
            .state
            .inputs
            .iter()
            .enumerate()
            .find_map(|(index, (method, input))| input.validate().err().map(|message| (index, *method, message)));
        if let Some((index, method, message)) = failure {
            warn!(%method, %message, "generate_reports: revalidation failed");
            self.state.set_error(format!(
                "Cannot generate reports. {message} Please go back and complete all required fields for {method}."
            ));
            self.state.input_cursor = index;
            self.state.step = Step::InputForm;
            return;
        }

        self.state.step = Step::Generating;
        self.state.clear_error();
        self.state.individual_reports.clear();
        self.state.integrated_report = None;
        self.state.archetype_tags.clear();
        self.state.sources.clear();

        match self
            .pipeline
            .run(&self.state.inputs, &self.state.user_name, &self.state.main_question)
            .await
        {
            Ok(output) => {
                self.state.individual_reports = output.individual;
                self.state.integrated_report = output.integrated;
                self.state.archetype_tags = output.tags;
                self.state.sources = output.sources;
                self.state.step = Step::ReportView;
                self.start_save();
            }
            Err(e) => {
                warn!(error = %e, "generate_reports: pipeline failed");
                self.state.set_error(e.to_string());
                if self.state.inputs.is_empty() {
                    self.state.step = Step::MethodSelection;
                } else {
                    self.state.input_cursor = self.state.inputs.len() - 1;
                    self.state.step = Step::InputForm;
                }
            }
        }
    }

    /// Kick off the detached save, if persistence is configured
    fn start_save(&mut self) {
        let Some(backend) = &self.backend else {
            debug!("start_save: persistence not configured");
            return;
        };

        let bundle = build_bundle(
            &self.state.user_name,
            &self.state.main_question,
            &self.state.inputs,
            &self.state.individual_reports,
            self.state.integrated_report.as_ref(),
            &self.state.archetype_tags,
            &self.model,
        );
        self.last_bundle = Some(bundle.clone());
        self.save_rx = Some(backend.spawn_save(bundle));
    }

    /// Current persistence status
    pub fn save_status(&self) -> SaveStatus {
        match &self.save_rx {
            Some(rx) => rx.borrow().clone(),
            None => SaveStatus::Idle,
        }
    }

    /// Re-send the last bundle after a failed save
    pub fn retry_save(&mut self) {
        let (Some(backend), Some(bundle)) = (&self.backend, self.last_bundle.clone()) else {
            return;
        };
        info!("retry_save: re-sending bundle");
        self.save_rx = Some(backend.spawn_save(bundle));
    }

    /// Open the grounded chat; the greeting becomes the first transcript entry
    pub async fn initiate_chat(&mut self) {
        info!("initiate_chat: called");
        if self.state.individual_reports.is_empty() && self.state.integrated_report.is_none() {
            self.state.set_error("No reports available to discuss yet.");
            return;
        }

        // Integrated report leads the context
        let mut reports = Vec::new();
        if let Some(integrated) = &self.state.integrated_report {
            reports.push(integrated.clone());
        }
        reports.extend(self.state.individual_reports.iter().cloned());

        match self
            .chat
            .start(
                &reports,
                &self.state.archetype_tags,
                &self.state.user_name,
                &self.state.main_question,
            )
            .await
        {
            Ok(greeting) => {
                self.state.chat_messages = vec![ChatMessage::assistant(greeting)];
                self.state.clear_error();
                self.state.step = Step::Chat;
            }
            Err(e) => {
                warn!(error = %e, "initiate_chat: failed");
                self.state.set_error(e.to_string());
            }
        }
    }

    /// Send one chat message; failures become in-transcript assistant turns
    pub async fn send_chat(&mut self, text: &str) {
        debug!(len = text.len(), "send_chat: called");
        self.state.chat_messages.push(ChatMessage::user(text));

        match self.chat.send(text).await {
            Ok(reply) => self.state.chat_messages.push(ChatMessage::assistant(reply)),
            Err(e) => {
                warn!(error = %e, "send_chat: failed");
                self.state
                    .chat_messages
                    .push(ChatMessage::assistant(format!(
                        "Sorry, I encountered an issue: {e} Please try again."
                    )));
            }
        }
    }

    /// Close the chat and return to the reports
    pub fn end_chat(&mut self) {
        debug!("end_chat: called");
        self.chat.end();
        self.state.chat_messages.clear();
        self.state.step = Step::ReportView;
    }

    /// Throw everything away and start over
    pub fn restart(&mut self) {
        info!("restart: called");
        self.chat.end();
        self.save_rx = None;
        self.last_bundle = None;
        self.state.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockGenerativeClient;

    fn wizard_with(client: Arc<MockGenerativeClient>) -> Wizard {
        Wizard::new(client, None, "gemini-2.5-flash")
    }

    fn ready_wizard(client: Arc<MockGenerativeClient>, methods: &[Method]) -> Wizard {
        let mut wizard = wizard_with(client);
        wizard.submit_demographics("Mia", "What is my purpose?");
        for method in methods {
            wizard.toggle_method(*method);
        }
        wizard.proceed_to_inputs();
        wizard
    }

    #[test]
    fn test_demographics_requires_name_and_question() {
        let mut wizard = wizard_with(Arc::new(MockGenerativeClient::new()));

        wizard.submit_demographics("", "question");
        assert_eq!(wizard.state.step, Step::Demographics);
        assert!(wizard.state.error.is_some());

        wizard.submit_demographics("Mia", "   ");
        assert_eq!(wizard.state.step, Step::Demographics);

        wizard.submit_demographics("Mia", "What is my purpose?");
        assert_eq!(wizard.state.step, Step::MethodSelection);
        assert!(wizard.state.error.is_none());
    }

    #[test]
    fn test_toggle_method_keeps_registry_order() {
        let mut wizard = wizard_with(Arc::new(MockGenerativeClient::new()));
        wizard.submit_demographics("Mia", "q");
        wizard.toggle_method(Method::Tarot);
        wizard.toggle_method(Method::LifePathNumber);
        assert_eq!(wizard.state.selected, vec![Method::LifePathNumber, Method::Tarot]);

        wizard.toggle_method(Method::Tarot);
        assert_eq!(wizard.state.selected, vec![Method::LifePathNumber]);
    }

    #[test]
    fn test_deselect_discards_collected_input() {
        let client = Arc::new(MockGenerativeClient::new());
        let mut wizard = ready_wizard(client, &[Method::Mbti]);
        wizard.update_input(MethodInput::Mbti {
            type_code: "INFJ".to_string(),
        });

        wizard.state.step = Step::MethodSelection;
        wizard.toggle_method(Method::Mbti);
        assert!(wizard.state.inputs.is_empty());
    }

    #[tokio::test]
    async fn test_deselect_clears_stale_reports() {
        let client = Arc::new(MockGenerativeClient::new());
        client.push_text("mbti reading");
        client.push_text("integrated reading");
        client.push_text(r#"["The Mentor"]"#);

        let mut wizard = ready_wizard(client, &[Method::Mbti]);
        wizard.update_input(MethodInput::Mbti {
            type_code: "INFJ".to_string(),
        });
        wizard.generate_reports().await;
        assert!(!wizard.state.individual_reports.is_empty());

        wizard.state.step = Step::MethodSelection;
        wizard.toggle_method(Method::Mbti);
        assert!(wizard.state.individual_reports.is_empty());
        assert!(wizard.state.integrated_report.is_none());
        assert!(wizard.state.archetype_tags.is_empty());
    }

    #[test]
    fn test_proceed_requires_selection() {
        let mut wizard = wizard_with(Arc::new(MockGenerativeClient::new()));
        wizard.submit_demographics("Mia", "q");
        wizard.proceed_to_inputs();
        assert_eq!(wizard.state.step, Step::MethodSelection);
        assert!(wizard.state.error.is_some());
    }

    #[test]
    fn test_next_input_blocks_on_invalid() {
        let client = Arc::new(MockGenerativeClient::new());
        let mut wizard = ready_wizard(client, &[Method::Mbti, Method::Tarot]);

        assert_eq!(wizard.next_input(), NextOutcome::Stay);
        assert_eq!(wizard.state.input_cursor, 0);
        assert!(wizard.state.error.is_some());

        wizard.update_input(MethodInput::Mbti {
            type_code: "INFJ".to_string(),
        });
        assert_eq!(wizard.next_input(), NextOutcome::Advanced);
        assert_eq!(wizard.state.input_cursor, 1);
        assert!(wizard.state.error.is_none());

        wizard.update_input(MethodInput::Tarot { reading_initiated: true });
        assert_eq!(wizard.next_input(), NextOutcome::Complete);
    }

    #[test]
    fn test_dob_sync_fills_blank_counterpart() {
        let client = Arc::new(MockGenerativeClient::new());
        let mut wizard = ready_wizard(client, &[Method::LifePathNumber, Method::Astrology]);

        wizard.update_input(MethodInput::LifePath {
            date_of_birth: "1990-04-12".to_string(),
        });
        assert_eq!(
            wizard.state.inputs[&Method::Astrology].date_of_birth(),
            Some("1990-04-12")
        );
    }

    #[test]
    fn test_dob_sync_latest_edit_wins() {
        let client = Arc::new(MockGenerativeClient::new());
        let mut wizard = ready_wizard(client, &[Method::LifePathNumber, Method::Astrology]);

        wizard.update_input(MethodInput::Astrology {
            date_of_birth: "1985-01-01".to_string(),
            time_of_birth: "08:30".to_string(),
            place_of_birth: "Lisbon".to_string(),
        });
        wizard.update_input(MethodInput::LifePath {
            date_of_birth: "1990-04-12".to_string(),
        });

        // The later edit equalizes both forms
        assert_eq!(
            wizard.state.inputs[&Method::Astrology].date_of_birth(),
            Some("1990-04-12")
        );
    }

    #[test]
    fn test_dob_sync_propagates_cleared_date() {
        let client = Arc::new(MockGenerativeClient::new());
        let mut wizard = ready_wizard(client, &[Method::LifePathNumber, Method::Astrology]);

        wizard.update_input(MethodInput::Astrology {
            date_of_birth: "1985-01-01".to_string(),
            time_of_birth: "08:30".to_string(),
            place_of_birth: "Lisbon".to_string(),
        });
        wizard.update_input(MethodInput::LifePath {
            date_of_birth: String::new(),
        });

        // Clearing the date on one form clears it on the other too
        assert_eq!(wizard.state.inputs[&Method::Astrology].date_of_birth(), Some(""));
    }

    #[test]
    fn test_dob_sync_works_both_directions() {
        let client = Arc::new(MockGenerativeClient::new());
        let mut wizard = ready_wizard(client, &[Method::LifePathNumber, Method::Astrology]);

        wizard.update_input(MethodInput::Astrology {
            date_of_birth: "1985-01-01".to_string(),
            time_of_birth: "08:30".to_string(),
            place_of_birth: "Lisbon".to_string(),
        });
        assert_eq!(
            wizard.state.inputs[&Method::LifePathNumber].date_of_birth(),
            Some("1985-01-01")
        );
    }

    #[tokio::test]
    async fn test_generate_reports_happy_path() {
        let client = Arc::new(MockGenerativeClient::new());
        client.push_text("mbti reading");
        client.push_text("integrated reading");
        client.push_text(r#"["The Mentor"]"#);

        let mut wizard = ready_wizard(client, &[Method::Mbti]);
        wizard.update_input(MethodInput::Mbti {
            type_code: "INFJ".to_string(),
        });
        wizard.generate_reports().await;

        assert_eq!(wizard.state.step, Step::ReportView);
        assert_eq!(wizard.state.individual_reports.len(), 1);
        assert!(wizard.state.integrated_report.is_some());
        assert_eq!(wizard.state.archetype_tags, vec!["The Mentor".to_string()]);
        assert_eq!(wizard.save_status(), SaveStatus::Idle);
    }

    #[tokio::test]
    async fn test_generate_reports_failure_returns_to_last_form() {
        let client = Arc::new(MockGenerativeClient::new());
        client.push_text("mbti reading");
        client.push_error(crate::llm::LlmError::ApiError {
            status: 500,
            message: "overloaded".to_string(),
        });

        let mut wizard = ready_wizard(client, &[Method::Mbti, Method::Tarot]);
        wizard.update_input(MethodInput::Mbti {
            type_code: "INFJ".to_string(),
        });
        wizard.update_input(MethodInput::Tarot { reading_initiated: true });
        wizard.generate_reports().await;

        assert_eq!(wizard.state.step, Step::InputForm);
        assert_eq!(wizard.state.input_cursor, 1);
        assert!(wizard.state.error.is_some());
        assert!(wizard.state.individual_reports.is_empty());
    }

    #[tokio::test]
    async fn test_generate_reports_revalidates_all_inputs() {
        let client = Arc::new(MockGenerativeClient::new());
        let mut wizard = ready_wizard(client, &[Method::Mbti, Method::Tarot]);
        wizard.update_input(MethodInput::Tarot { reading_initiated: true });

        // MBTI was never filled in
        wizard.generate_reports().await;

        assert_eq!(wizard.state.step, Step::InputForm);
        assert_eq!(wizard.state.input_cursor, 0);
        let error = wizard.state.error.as_deref().unwrap();
        assert!(error.starts_with("Cannot generate reports."));
        assert!(error.contains("MBTI"));
    }

    #[tokio::test]
    async fn test_chat_round_trip() {
        let client = Arc::new(MockGenerativeClient::new());
        client.push_text("mbti reading");
        client.push_text("integrated reading");
        client.push_text(r#"["The Mentor"]"#);
        client.push_chat_session(vec!["Hello Mia!", "Great question."]);

        let mut wizard = ready_wizard(client, &[Method::Mbti]);
        wizard.update_input(MethodInput::Mbti {
            type_code: "INFJ".to_string(),
        });
        wizard.generate_reports().await;

        wizard.initiate_chat().await;
        assert_eq!(wizard.state.step, Step::Chat);
        assert_eq!(wizard.state.chat_messages.len(), 1);
        assert_eq!(wizard.state.chat_messages[0].text, "Hello Mia!");

        wizard.send_chat("What should I focus on?").await;
        assert_eq!(wizard.state.chat_messages.len(), 3);
        assert_eq!(wizard.state.chat_messages[2].text, "Great question.");

        wizard.end_chat();
        assert_eq!(wizard.state.step, Step::ReportView);
        assert!(wizard.state.chat_messages.is_empty());
    }

    #[tokio::test]
    async fn test_chat_send_failure_stays_in_transcript() {
        let client = Arc::new(MockGenerativeClient::new());
        client.push_text("mbti reading");
        client.push_text("integrated reading");
        client.push_text(r#"["The Mentor"]"#);
        // Greeting only; the next send fails with an invalidating error
        client.push_chat_session(vec!["Hello Mia!"]);

        let mut wizard = ready_wizard(client, &[Method::Mbti]);
        wizard.update_input(MethodInput::Mbti {
            type_code: "INFJ".to_string(),
        });
        wizard.generate_reports().await;
        wizard.initiate_chat().await;

        wizard.send_chat("hello?").await;
        assert_eq!(wizard.state.step, Step::Chat);
        let last = wizard.state.chat_messages.last().unwrap();
        assert!(last.text.starts_with("Sorry, I encountered an issue:"));
        assert!(last.text.ends_with("Please try again."));
    }

    #[tokio::test]
    async fn test_restart_clears_session() {
        let client = Arc::new(MockGenerativeClient::new());
        client.push_text("mbti reading");
        client.push_text("integrated reading");
        client.push_text(r#"["The Mentor"]"#);

        let mut wizard = ready_wizard(client, &[Method::Mbti]);
        wizard.update_input(MethodInput::Mbti {
            type_code: "INFJ".to_string(),
        });
        wizard.generate_reports().await;
        wizard.restart();

        assert_eq!(wizard.state.step, Step::Demographics);
        assert!(wizard.state.individual_reports.is_empty());
        assert_eq!(wizard.save_status(), SaveStatus::Idle);
    }
}
