use crate::{
    config::Config,
    constants::{APOLOGY_PHRASES, APOLOGY_REPEAT_THRESHOLD, ASSISTANT_CONTEXT},
    error::{AppError, Result},
    utils::truncate_chars,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const NO_RESPONSE_GENERATED: &str = "No response generated";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("AI provider not configured")]
    NotConfigured,

    #[error("AI request failed: {0}")]
    Transport(String),

    #[error("AI request timed out")]
    Timeout,

    #[error("AI provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed AI response: {0}")]
    MalformedResponse(String),
}

/// General-query backend: text in, generated text out.
#[async_trait::async_trait]
pub trait QueryResponder: Send + Sync {
    async fn ask(&self, input: &str) -> std::result::Result<String, QueryError>;
}

/// Whether a generated reply keeps apologising instead of answering.
pub fn is_degenerate_reply(reply: &str) -> bool {
    let apologies: usize = APOLOGY_PHRASES
        .iter()
        .map(|phrase| reply.matches(phrase).count())
        .sum();
    apologies > APOLOGY_REPEAT_THRESHOLD
}

fn build_prompt(input: &str) -> String {
    format!("{} {}", ASSISTANT_CONTEXT, input)
}

// ==================== GEMINI ====================

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

impl GenerateContentRequest {
    fn for_input(input: &str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(input),
                }],
            }],
        }
    }
}

fn first_candidate_text(response: GenerateContentResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content.parts.into_iter().next())
        .map(|part| part.text)
        .unwrap_or_else(|| NO_RESPONSE_GENERATED.to_string())
}

/// Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiResponder {
    client: reqwest::Client,
    api_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiResponder {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.ai_timeout())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url: config.gemini_api_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            api_key: config.gemini_api_key.clone(),
        })
    }

    fn endpoint(&self, api_key: &str) -> std::result::Result<url::Url, QueryError> {
        let mut endpoint = url::Url::parse(&format!(
            "{}/models/{}:generateContent",
            self.api_url, self.model
        ))
        .map_err(|e| QueryError::Transport(format!("invalid Gemini URL: {}", e)))?;
        endpoint.query_pairs_mut().append_pair("key", api_key);
        Ok(endpoint)
    }
}

#[async_trait::async_trait]
impl QueryResponder for GeminiResponder {
    async fn ask(&self, input: &str) -> std::result::Result<String, QueryError> {
        let api_key = self.api_key.as_deref().ok_or(QueryError::NotConfigured)?;
        let endpoint = self.endpoint(api_key)?;

        let response = self
            .client
            .post(endpoint)
            .json(&GenerateContentRequest::for_input(input))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QueryError::Timeout
                } else {
                    QueryError::Transport(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Status {
                status: status.as_u16(),
                body: truncate_chars(&body, 512),
            });
        }

        let payload = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| QueryError::MalformedResponse(e.without_url().to_string()))?;

        Ok(first_candidate_text(payload))
    }
}
