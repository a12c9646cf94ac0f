//! Report generation pipeline
//!
//! Runs the whole analysis for one wizard session: one generation call per
//! selected method in registry order, then a synthesis call over the
//! finished reports, then archetype tag extraction from the synthesis.
//! Generation failures abort the run; tag failures degrade to a placeholder
//! tag and never abort.

use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::llm::{GenerationRequest, GenerativeClient, GroundingSource, LlmError};
use crate::methods::{Method, MethodInput, UserInputs};
use crate::prompts::{PromptBuilder, truncate_chars};
use crate::wizard::Report;

/// Title of the synthesis report
pub const INTEGRATED_TITLE: &str = "Integrated Comprehensive Analysis";

/// Pipeline failure modes
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to generate {method} report: {source}")]
    Generation { method: Method, source: LlmError },

    #[error("Failed to generate integrated report: {0}")]
    Integration(#[source] LlmError),

    #[error("Failed to render prompt template: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("Palm image is missing for Palmistry")]
    MissingImage,
}

/// Everything one pipeline run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub individual: Vec<Report>,
    pub integrated: Option<Report>,
    pub tags: Vec<String>,
    pub sources: Vec<GroundingSource>,
}

/// How the archetype tag response was interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOutcome {
    /// The model returned the requested JSON array of strings
    Parsed(Vec<String>),
    /// The model returned an object with string values; the values are used
    Coerced(Vec<String>),
    /// Unusable response; a single placeholder tag is shown instead
    Fallback(String),
}

impl TagOutcome {
    pub fn into_tags(self) -> Vec<String> {
        match self {
            TagOutcome::Parsed(tags) | TagOutcome::Coerced(tags) => tags,
            TagOutcome::Fallback(placeholder) => vec![placeholder],
        }
    }
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^```(\w*)?\s*\n?(.*?)\n?\s*```$").unwrap())
}

/// Strip a surrounding markdown code fence, if present
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match fence_re().captures(trimmed).and_then(|caps| caps.get(2)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// Interpret the raw tag response
///
/// The model is asked for a JSON array of strings but sometimes wraps it in
/// a code fence or returns an object keyed by index or label.
pub fn parse_archetype_tags(raw: &str, user_name: &str) -> TagOutcome {
    let cleaned = strip_code_fence(raw);

    let value: serde_json::Value = match serde_json::from_str(cleaned) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "parse_archetype_tags: response is not JSON");
            let prefix = if user_name.is_empty() {
                String::new()
            } else {
                format!("{user_name}, ")
            };
            return TagOutcome::Fallback(format!("Tags (preview): {prefix}parsing error"));
        }
    };

    match value {
        serde_json::Value::Array(items) if items.iter().all(|i| i.is_string()) => TagOutcome::Parsed(
            items
                .into_iter()
                .filter_map(|i| i.as_str().map(String::from))
                .collect(),
        ),
        serde_json::Value::Object(map) if map.values().all(|v| v.is_string()) => TagOutcome::Coerced(
            map.into_iter()
                .filter_map(|(_, v)| v.as_str().map(String::from))
                .collect(),
        ),
        other => {
            warn!(?other, "parse_archetype_tags: unexpected JSON shape");
            TagOutcome::Fallback(format!(
                "Tags (preview): {}... (format error)",
                truncate_chars(cleaned, 100)
            ))
        }
    }
}

/// Deduplicate pooled citations by uri, first occurrence wins
pub fn dedupe_sources(sources: Vec<GroundingSource>) -> Vec<GroundingSource> {
    let mut seen = std::collections::HashSet::new();
    sources
        .into_iter()
        .filter(|s| seen.insert(s.uri.clone()))
        .collect()
}

/// Phrases that suggest the question is about current events
const RECENT_MARKERS: [&str; 8] = [
    "recent", "recently", "lately", "today", "this week", "this month", "current", "news",
];

/// Should the tarot call enable web search grounding?
fn question_mentions_recent(question: &str) -> bool {
    let lower = question.to_lowercase();
    RECENT_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Drives the full generation sequence for one session
pub struct ReportPipeline {
    llm: Arc<dyn GenerativeClient>,
    prompts: PromptBuilder,
}

impl ReportPipeline {
    pub fn new(llm: Arc<dyn GenerativeClient>) -> Self {
        Self {
            llm,
            prompts: PromptBuilder::new(),
        }
    }

    /// Run the whole pipeline over validated inputs
    ///
    /// Inputs iterate in registry order because `UserInputs` is ordered by
    /// method. Callers validate before invoking; an unvalidated palmistry
    /// input without an image still fails cleanly here.
    pub async fn run(
        &self,
        inputs: &UserInputs,
        user_name: &str,
        main_question: &str,
    ) -> Result<PipelineOutput, PipelineError> {
        info!(methods = inputs.len(), "pipeline run: starting");
        let mut individual = Vec::new();
        let mut pooled: Vec<GroundingSource> = Vec::new();

        for (method, input) in inputs {
            debug!(%method, "pipeline run: generating individual report");
            let prompt = self.prompts.method_prompt(input, user_name, main_question)?;
            let mut request = GenerationRequest::text(prompt);

            if let MethodInput::Palmistry { image_base64, .. } = input {
                let data = image_base64.as_deref().ok_or(PipelineError::MissingImage)?;
                request = request.with_image("image/jpeg", data);
            }
            if *method == Method::Tarot && question_mentions_recent(main_question) {
                debug!("pipeline run: enabling search for tarot");
                request = request.with_search();
            }

            let response = self
                .llm
                .generate(request)
                .await
                .map_err(|source| PipelineError::Generation { method: *method, source })?;

            pooled.extend(response.sources);
            individual.push(Report::new(format!("{} Analysis", method.display_name()), response.text));
        }

        let mut integrated = None;
        let mut tags = Vec::new();

        if !individual.is_empty() {
            debug!("pipeline run: generating integrated report");
            let prompt = self.prompts.integrated_prompt(&individual, user_name, main_question)?;
            let response = self
                .llm
                .generate(GenerationRequest::text(prompt))
                .await
                .map_err(PipelineError::Integration)?;

            pooled.extend(response.sources);
            tags = self.derive_tags(&response.text, user_name).await;
            integrated = Some(Report::new(INTEGRATED_TITLE, response.text));
        }

        info!(
            reports = individual.len(),
            tags = tags.len(),
            "pipeline run: complete"
        );
        Ok(PipelineOutput {
            individual,
            integrated,
            tags,
            sources: dedupe_sources(pooled),
        })
    }

    /// Tag extraction; every failure path degrades to a placeholder tag
    async fn derive_tags(&self, analysis: &str, user_name: &str) -> Vec<String> {
        let prompt = match self.prompts.tags_prompt(analysis, user_name) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "derive_tags: template render failed");
                return vec![fallback_parse_tag(user_name)];
            }
        };

        match self.llm.generate(GenerationRequest::text(prompt).expect_json()).await {
            Ok(response) => parse_archetype_tags(&response.text, user_name).into_tags(),
            Err(e) => {
                warn!(error = %e, "derive_tags: generation failed");
                vec![fallback_parse_tag(user_name)]
            }
        }
    }
}

fn fallback_parse_tag(user_name: &str) -> String {
    if user_name.is_empty() {
        "Tags (preview): parsing error".to_string()
    } else {
        format!("Tags (preview): {user_name}, parsing error")
    }
}
