//! Wizard session state
//!
//! One `WizardState` lives for the whole run. Steps only ever move along
//! the fixed path (demographics, selection, inputs, generating, report,
//! chat) or back to an earlier form on failure; the state itself carries
//! everything each step needs.

use serde::{Deserialize, Serialize};

use crate::chat::ChatMessage;
use crate::llm::GroundingSource;
use crate::methods::{Method, UserInputs};

/// A finished analysis report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub content: String,
}

impl Report {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Where the wizard currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Demographics,
    MethodSelection,
    InputForm,
    Generating,
    ReportView,
    Chat,
}

/// Everything one wizard run accumulates
#[derive(Debug)]
pub struct WizardState {
    pub step: Step,

    pub user_name: String,
    pub main_question: String,

    /// Methods the user has toggled on, in registry order
    pub selected: Vec<Method>,

    /// Collected inputs, keyed (and therefore ordered) by method
    pub inputs: UserInputs,

    /// Index into `inputs` of the method currently being collected
    pub input_cursor: usize,

    pub individual_reports: Vec<Report>,
    pub integrated_report: Option<Report>,
    pub archetype_tags: Vec<String>,
    pub sources: Vec<GroundingSource>,

    pub chat_messages: Vec<ChatMessage>,

    /// Last user-facing error, cleared on the next successful action
    pub error: Option<String>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardState {
    pub fn new() -> Self {
        Self {
            step: Step::Demographics,
            user_name: String::new(),
            main_question: String::new(),
            selected: Vec::new(),
            inputs: UserInputs::new(),
            input_cursor: 0,
            individual_reports: Vec::new(),
            integrated_report: None,
            archetype_tags: Vec::new(),
            sources: Vec::new(),
            chat_messages: Vec::new(),
            error: None,
        }
    }

    /// Method currently being collected, if the cursor is in range
    pub fn current_method(&self) -> Option<Method> {
        self.inputs.keys().nth(self.input_cursor).copied()
    }

    /// All reports in display order: individual first, integrated last
    pub fn all_reports(&self) -> Vec<Report> {
        let mut reports = self.individual_reports.clone();
        if let Some(integrated) = &self.integrated_report {
            reports.push(integrated.clone());
        }
        reports
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Wipe everything back to a fresh demographics step
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::MethodInput;

    #[test]
    fn test_new_state_starts_at_demographics() {
        let state = WizardState::new();
        assert_eq!(state.step, Step::Demographics);
        assert!(state.selected.is_empty());
        assert!(state.error.is_none());
    }

    #[test]
    fn test_current_method_follows_cursor() {
        let mut state = WizardState::new();
        state.inputs.insert(Method::Astrology, MethodInput::empty_for(Method::Astrology));
        state.inputs.insert(Method::Tarot, MethodInput::empty_for(Method::Tarot));

        assert_eq!(state.current_method(), Some(Method::Astrology));
        state.input_cursor = 1;
        assert_eq!(state.current_method(), Some(Method::Tarot));
        state.input_cursor = 2;
        assert_eq!(state.current_method(), None);
    }

    #[test]
    fn test_all_reports_puts_integrated_last() {
        let mut state = WizardState::new();
        state.individual_reports.push(Report::new("Tarot Analysis", "cards"));
        state.integrated_report = Some(Report::new("Integrated Comprehensive Analysis", "synthesis"));

        let all = state.all_reports();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].title, "Integrated Comprehensive Analysis");
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = WizardState::new();
        state.user_name = "Mia".to_string();
        state.step = Step::ReportView;
        state.set_error("boom");
        state.reset();
        assert_eq!(state.step, Step::Demographics);
        assert!(state.user_name.is_empty());
        assert!(state.error.is_none());
    }
}
