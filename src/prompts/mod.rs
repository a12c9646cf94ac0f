//! Prompt Template System
//!
//! Renders `.pmt` (prompt template) files embedded in the binary. Templates
//! use Handlebars syntax; user text is substituted with triple-stash so
//! quotes and apostrophes survive intact.

pub mod embedded;

use handlebars::{Handlebars, RenderError};
use serde::Serialize;
use tracing::debug;

use crate::methods::{Method, MethodInput};
use crate::wizard::Report;

/// Language-matching directive for report generation
const REPORT_LANGUAGE: &str = "IMPORTANT: Respond in the same language as the user's input. If the user's name or question is in Chinese, respond in Chinese. If in English, respond in English. If mixed or unclear, use the primary language of their question or name.";

/// Shared formatting directive for per-method reports
const REPORT_FORMAT: &str = "Format as a professional divination report. Use markdown for structure. Keep the report concise and focused on the most impactful insights.";

/// Language-matching directive for the integrated synthesis
const INTEGRATED_LANGUAGE: &str = "IMPORTANT: Respond in the same language as the user's input. If the user's name or question suggests Chinese, respond in Chinese. If English, respond in English. Match the user's primary language.";

/// Language-matching directive for archetype tags
const TAGS_LANGUAGE: &str = "IMPORTANT: Generate tags in the same language as the analysis text or user's name. If Chinese context, use Chinese tags. If English context, use English tags.";

/// Longest analysis excerpt fed to tag extraction
const TAGS_ANALYSIS_LIMIT: usize = 15_000;

/// Longest per-report excerpt fed to the chat system instruction
const CHAT_SUMMARY_LIMIT: usize = 500;

/// Truncate to at most `max` characters, never splitting a code point
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Context for the per-method report templates
///
/// One struct serves all five templates; each template reads only the
/// fields it names.
#[derive(Debug, Clone, Serialize)]
struct MethodContext<'a> {
    user_name: Option<&'a str>,
    main_question: Option<&'a str>,
    /// How the prompt addresses the user when a name is required in-line
    subject: &'a str,
    date_of_birth: &'a str,
    time_of_birth: &'a str,
    place_of_birth: &'a str,
    mbti_type: &'a str,
    language_instruction: &'static str,
    format_instructions: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct IntegratedContext<'a> {
    user_name: Option<&'a str>,
    main_question: Option<&'a str>,
    combined_reports: String,
    language_instruction: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct TagsContext<'a> {
    user_name: Option<&'a str>,
    analysis_excerpt: &'a str,
    language_instruction: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct ChatContext<'a> {
    user_name: &'a str,
    main_question: &'a str,
    tags: String,
    report_summary: String,
}

fn non_empty(s: &str) -> Option<&str> {
    if s.trim().is_empty() { None } else { Some(s) }
}

/// Renders prompt templates for the report pipeline and chat
pub struct PromptBuilder {
    hbs: Handlebars<'static>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self { hbs: Handlebars::new() }
    }

    /// Render the analysis prompt for one method
    ///
    /// The palmistry prompt covers only the text part; the caller attaches
    /// the image to the request separately.
    pub fn method_prompt(
        &self,
        input: &MethodInput,
        user_name: &str,
        main_question: &str,
    ) -> Result<String, RenderError> {
        let method = input.method();
        debug!(%method, "method_prompt: called");

        let mut ctx = MethodContext {
            user_name: non_empty(user_name),
            main_question: non_empty(main_question),
            subject: non_empty(user_name).unwrap_or("the user"),
            date_of_birth: "",
            time_of_birth: "",
            place_of_birth: "",
            mbti_type: "",
            language_instruction: REPORT_LANGUAGE,
            format_instructions: REPORT_FORMAT,
        };

        let template = match input {
            MethodInput::LifePath { date_of_birth } => {
                ctx.date_of_birth = date_of_birth;
                embedded::LIFE_PATH
            }
            MethodInput::Palmistry { .. } => embedded::PALMISTRY,
            MethodInput::Astrology {
                date_of_birth,
                time_of_birth,
                place_of_birth,
            } => {
                ctx.date_of_birth = date_of_birth;
                ctx.time_of_birth = time_of_birth;
                ctx.place_of_birth = place_of_birth;
                embedded::ASTROLOGY
            }
            MethodInput::Mbti { type_code } => {
                ctx.mbti_type = type_code;
                embedded::MBTI
            }
            MethodInput::Tarot { .. } => embedded::TAROT,
        };

        self.hbs.render_template(template, &ctx)
    }

    /// Render the synthesis prompt over the finished individual reports
    pub fn integrated_prompt(
        &self,
        reports: &[Report],
        user_name: &str,
        main_question: &str,
    ) -> Result<String, RenderError> {
        debug!(reports = reports.len(), "integrated_prompt: called");
        let combined_reports = reports
            .iter()
            .map(|r| format!("## {}\n{}", r.title, r.content))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        self.hbs.render_template(
            embedded::INTEGRATED,
            &IntegratedContext {
                user_name: non_empty(user_name),
                main_question: non_empty(main_question),
                combined_reports,
                language_instruction: INTEGRATED_LANGUAGE,
            },
        )
    }

    /// Render the archetype tag extraction prompt
    pub fn tags_prompt(&self, analysis_text: &str, user_name: &str) -> Result<String, RenderError> {
        debug!(analysis_len = analysis_text.len(), "tags_prompt: called");
        self.hbs.render_template(
            embedded::TAGS,
            &TagsContext {
                user_name: non_empty(user_name),
                analysis_excerpt: truncate_chars(analysis_text, TAGS_ANALYSIS_LIMIT),
                language_instruction: TAGS_LANGUAGE,
            },
        )
    }

    /// Render the chat companion's system instruction
    pub fn chat_system(
        &self,
        reports: &[Report],
        tags: &[String],
        user_name: &str,
        main_question: &str,
    ) -> Result<String, RenderError> {
        debug!(reports = reports.len(), tags = tags.len(), "chat_system: called");
        let report_summary = reports
            .iter()
            .map(|r| format!("### {}\n{}...", r.title, truncate_chars(&r.content, CHAT_SUMMARY_LIMIT)))
            .collect::<Vec<_>>()
            .join("\n\n");

        self.hbs.render_template(
            embedded::CHAT_SYSTEM,
            &ChatContext {
                user_name,
                main_question,
                tags: tags.join(", "),
                report_summary,
            },
        )
    }
}
