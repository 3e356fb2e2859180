use async_trait::async_trait;
use dialog_flow::{AssistantError, Message, MessageRole, Result};
use reqwest::StatusCode;
use rig::client::CompletionClient;
use rig::completion::Chat;
use rig::providers::gemini;
use serde::{Deserialize, Serialize};
use tracing::warn;

const SYSTEM_PROMPT: &str = "You are a helpful insurance policy assistant. Answer the user's question using any policy data included with it. \
Be friendly, professional, and concise. If the question needs information you do not have, say what you would need (such as a policy number or member name).";

const GENERATE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Boundary to the generative-language provider.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Whether a credential is configured. When false, callers must not
    /// invoke [`complete`](Self::complete) and should produce templated
    /// replies instead.
    fn is_configured(&self) -> bool;

    async fn complete(&self, prompt: &str, history: &[Message]) -> Result<String>;
}

/// Gemini gateway: primary call through the rig client, one fallback attempt
/// against the raw generateContent endpoint, then give up. The orchestrator
/// owns any further degradation.
pub struct GeminiGateway {
    api_key: Option<String>,
    model: String,
    http: reqwest::Client,
}

impl GeminiGateway {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            http: reqwest::Client::new(),
        }
    }

    async fn complete_primary(
        &self,
        api_key: &str,
        prompt: &str,
        history: &[Message],
    ) -> anyhow::Result<String> {
        let agent = gemini::Client::new(api_key)
            .agent(&self.model)
            .preamble(SYSTEM_PROMPT)
            .build();
        let response = agent.chat(prompt, to_rig_messages(history)).await?;
        Ok(response)
    }

    async fn complete_fallback(
        &self,
        api_key: &str,
        prompt: &str,
        history: &[Message],
    ) -> Result<String> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            GENERATE_BASE_URL, self.model, api_key
        );
        let body = GenerateRequest::from_turn(prompt, history);

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AssistantError::Provider(format!("fallback request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Provider(format!("malformed provider response: {e}")))?;
        parsed.first_text().ok_or_else(|| {
            AssistantError::Provider("provider response contained no candidate text".to_string())
        })
    }
}

#[async_trait]
impl ChatModel for GeminiGateway {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, prompt: &str, history: &[Message]) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AssistantError::Configuration("GEMINI_API_KEY is not set".to_string()))?
            .to_string();

        match self.complete_primary(&api_key, prompt, history).await {
            Ok(text) => Ok(text),
            Err(primary) => {
                warn!(error = %primary, "primary model call failed, trying raw endpoint");
                self.complete_fallback(&api_key, prompt, history).await
            }
        }
    }
}

fn status_error(status: StatusCode) -> AssistantError {
    match status {
        StatusCode::NOT_FOUND => {
            AssistantError::Provider("model endpoint not found (HTTP 404)".to_string())
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AssistantError::Provider(format!(
            "provider rejected the credential (HTTP {})",
            status.as_u16()
        )),
        _ => AssistantError::Provider(format!("provider request failed (HTTP {})", status.as_u16())),
    }
}

fn to_rig_messages(history: &[Message]) -> Vec<rig::completion::Message> {
    history
        .iter()
        .map(|m| match m.role {
            MessageRole::User => rig::completion::Message::user(m.text.clone()),
            MessageRole::Assistant => rig::completion::Message::assistant(m.text.clone()),
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

impl GenerateRequest {
    fn from_turn(prompt: &str, history: &[Message]) -> Self {
        let mut contents: Vec<Content> = history
            .iter()
            .map(|m| Content {
                role: match m.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "model",
                },
                parts: vec![Part {
                    text: m.text.clone(),
                }],
            })
            .collect();
        contents.push(Content {
            role: "user",
            parts: vec![Part {
                text: format!("{SYSTEM_PROMPT}\n\n{prompt}"),
            }],
        });
        Self { contents }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

impl GenerateResponse {
    fn first_text(&self) -> Option<String> {
        self.candidates
            .first()?
            .content
            .parts
            .first()
            .map(|p| p.text.clone())
    }
}
