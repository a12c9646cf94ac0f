//! Fire-and-forget persistence of finished readings
//!
//! Saving never blocks the user: the upload runs as a detached task and
//! publishes its progress through a watch slot the display layer can poll.
//! Failures surface as a status indicator with a manual retry, nothing more.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::methods::{MethodInput, UserInputs};
use crate::wizard::Report;

/// Persistence failure modes
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend error {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Progress of the detached save task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    InFlight,
    Succeeded,
    Failed(String),
}

/// Flattened per-method inputs, in the shape the service stores
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InputData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub palm_image_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mbti_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tarot_question: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub tarot_reading_initiated: bool,
}

/// One complete reading batch, ready to POST
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadingBundle {
    pub user_name: String,
    pub primary_question: String,
    pub selected_methods: Vec<&'static str>,
    /// Keyed by the service's method identifiers
    pub individual_reports: BTreeMap<&'static str, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrated_report: Option<String>,
    pub input_data: InputData,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub character_archetypes: Vec<String>,
    pub ai_model_used: String,
    pub total_processing_time: i64,
}

/// Assemble the bundle from finished session state
///
/// Reports pair up with inputs by position; both follow registry order, so
/// the zip lines each report up with the method that produced it.
pub fn build_bundle(
    user_name: &str,
    main_question: &str,
    inputs: &UserInputs,
    individual: &[Report],
    integrated: Option<&Report>,
    tags: &[String],
    model: &str,
) -> ReadingBundle {
    let selected_methods: Vec<&'static str> = inputs.keys().map(|m| m.backend_id()).collect();

    let mut individual_reports = BTreeMap::new();
    for ((method, _), report) in inputs.iter().zip(individual) {
        individual_reports.insert(method.backend_id(), report.content.clone());
    }

    let mut input_data = InputData::default();
    for input in inputs.values() {
        match input {
            MethodInput::LifePath { date_of_birth } => {
                if !date_of_birth.is_empty() {
                    input_data.birth_date = Some(date_of_birth.clone());
                }
            }
            MethodInput::Palmistry { image_base64, .. } => {
                input_data.palm_image_data = image_base64.clone();
                input_data.hand_type = Some("uploaded".to_string());
            }
            MethodInput::Astrology {
                date_of_birth,
                time_of_birth,
                place_of_birth,
            } => {
                if !date_of_birth.is_empty() {
                    input_data.birth_date = Some(date_of_birth.clone());
                }
                if !time_of_birth.is_empty() {
                    input_data.birth_time = Some(time_of_birth.clone());
                }
                if !place_of_birth.is_empty() {
                    input_data.birth_location = Some(place_of_birth.clone());
                }
            }
            MethodInput::Mbti { type_code } => {
                if !type_code.is_empty() {
                    input_data.mbti_type = Some(type_code.clone());
                }
            }
            MethodInput::Tarot { .. } => {
                input_data.tarot_question = Some(main_question.to_string());
                input_data.tarot_reading_initiated = true;
            }
        }
    }

    ReadingBundle {
        user_name: user_name.to_string(),
        primary_question: main_question.to_string(),
        selected_methods,
        individual_reports,
        integrated_report: integrated.map(|r| r.content.clone()),
        input_data,
        character_archetypes: tags.to_vec(),
        ai_model_used: model.to_string(),
        total_processing_time: Utc::now().timestamp(),
    }
}

/// Pull a human-readable message out of an error body
///
/// The service is FastAPI-shaped: errors usually carry a `detail` field
/// that may be a string, an object, or a list of validation records.
fn extract_detail(raw: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(body) => match body.get("detail") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        Err(_) => raw.to_string(),
    }
}

/// HTTP client for the readings service
pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
}

impl BackendClient {
    /// Build from configuration; `None` when no base URL is configured,
    /// which disables persistence entirely.
    pub fn from_config(config: &BackendConfig) -> Option<Self> {
        let base_url = config.base_url.clone()?;
        debug!(%base_url, "BackendClient::from_config: persistence enabled");
        Some(Self {
            base_url,
            http: reqwest::Client::new(),
        })
    }

    /// POST one reading bundle
    pub async fn save_batch(&self, bundle: &ReadingBundle) -> Result<(), BackendError> {
        let url = format!("{}/batch/readings", self.base_url);
        debug!(%url, methods = bundle.selected_methods.len(), "save_batch: called");

        let response = self.http.post(&url).json(bundle).send().await?;
        let status = response.status();

        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let detail = extract_detail(&raw);
            warn!(status = status.as_u16(), %detail, "save_batch: rejected");
            return Err(BackendError::Api {
                status: status.as_u16(),
                detail,
            });
        }

        info!("save_batch: saved");
        Ok(())
    }

    /// Kick off the save as a detached task
    ///
    /// The returned receiver starts at `InFlight` and settles to
    /// `Succeeded` or `Failed` when the upload finishes.
    pub fn spawn_save(self: &Arc<Self>, bundle: ReadingBundle) -> watch::Receiver<SaveStatus> {
        let (tx, rx) = watch::channel(SaveStatus::InFlight);
        let client = Arc::clone(self);

        tokio::spawn(async move {
            match client.save_batch(&bundle).await {
                Ok(()) => {
                    let _ = tx.send(SaveStatus::Succeeded);
                }
                Err(e) => {
                    warn!(error = %e, "spawn_save: save failed");
                    let _ = tx.send(SaveStatus::Failed(e.to_string()));
                }
            }
        });

        rx
    }
}
