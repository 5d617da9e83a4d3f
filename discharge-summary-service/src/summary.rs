//! Requests a prose discharge summary from a chat-completion API.
//!
//! Any failure on this path degrades to [`FALLBACK_SUMMARY`]; the session always
//! gets text it can edit and render.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::models::PatientRecord;

pub const FALLBACK_SUMMARY: &str = "Error generating discharge summary. Please try again.";

pub const REQUIRED_SECTIONS: [&str; 8] = [
    "Patient Demographics",
    "Admission Information",
    "Hospital Course",
    "Discharge Diagnoses",
    "Procedures Performed",
    "Discharge Medications",
    "Follow-up Instructions",
    "Discharge Condition",
];

const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("No API key configured for the text-generation service")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Text-generation service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Response did not contain any generated text")]
    EmptyResponse,

    #[error("Failed to serialize patient record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The external text-generation collaborator.
#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, SummaryError>;
}

/// Outcome of a fail-soft summary request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryOutcome {
    pub text: String,
    pub is_fallback: bool,
}

pub fn build_prompt(record: &PatientRecord) -> Result<String, SummaryError> {
    let record_json = serde_json::to_string_pretty(record)?;
    let sections = REQUIRED_SECTIONS
        .iter()
        .enumerate()
        .map(|(i, section)| format!("{}. {}", i + 1, section))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        "Generate a comprehensive medical discharge summary based on the following patient data:

{record_json}

Include the following sections:
{sections}

The summary should be professionally written as a medical document, using appropriate medical terminology."
    ))
}

/// Never fails: transport, service and parsing errors all produce the fallback text.
pub async fn request_summary(
    generator: &dyn SummaryGenerator,
    record: &PatientRecord,
) -> SummaryOutcome {
    let result = match build_prompt(record) {
        Ok(prompt) => generator.complete(&prompt).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(text) => {
            info!(characters = text.len(), "Discharge summary generated");
            SummaryOutcome {
                text,
                is_fallback: false,
            }
        }
        Err(e) => {
            error!(error = %e, "Error generating discharge summary");
            SummaryOutcome {
                text: FALLBACK_SUMMARY.to_string(),
                is_fallback: true,
            }
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Client for the Mistral chat-completions endpoint.
#[derive(Clone)]
pub struct MistralClient {
    http: Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl MistralClient {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.into(),
            api_key,
            model: model.into(),
        }
    }
}

#[async_trait]
impl SummaryGenerator for MistralClient {
    async fn complete(&self, prompt: &str) -> Result<String, SummaryError> {
        let api_key = self.api_key.as_deref().ok_or(SummaryError::MissingApiKey)?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            stream: false,
        };

        info!(model = %self.model, prompt_length = prompt.len(), "Requesting discharge summary");

        let response = self
            .http
            .post(&self.api_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummaryError::Status { status, body });
        }

        let body: ChatResponse = response.json().await?;
        extract_text(body)
    }
}

fn extract_text(response: ChatResponse) -> Result<String, SummaryError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or(SummaryError::EmptyResponse)
}
