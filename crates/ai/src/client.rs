//! LLM client trait and the Groq-backed implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prompts;

/// Chat-completions endpoint (OpenAI-compatible).
const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Default production model (128K context).
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

#[derive(Debug, Error)]
pub enum LlmError {
    /// API key missing at call time. Startup does not require the key; the
    /// failure surfaces on first use.
    #[error("LLM API key is not configured (set GROQ_API_KEY)")]
    MissingApiKey,

    #[error("LLM request failed: {0}")]
    Request(String),

    /// The provider answered, but not with a usable completion.
    #[error("LLM response malformed: {0}")]
    Malformed(String),
}

/// The two inference operations the system needs.
///
/// One synchronous call per operation; retries belong to the job layer, not
/// here.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Produce a structured review of a meeting transcript.
    async fn transcript_insight(&self, transcript_text: &str) -> Result<String, LlmError>;

    /// Produce an icebreaker analysis from a LinkedIn bio and pitch-deck text.
    async fn icebreaker_analysis(
        &self,
        linkedin_bio: &str,
        pitch_deck: &str,
    ) -> Result<String, LlmError>;
}

/// Groq chat-completions client.
#[derive(Debug, Clone)]
pub struct GroqClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
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

impl GroqClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Read `GROQ_API_KEY` from the environment. A missing key is not an
    /// error here; it becomes [`LlmError::MissingApiKey`] on first call.
    pub fn from_env() -> Self {
        Self::new(std::env::var("GROQ_API_KEY").ok())
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature: 0.7,
        };

        let response = self
            .http
            .post(GROQ_API_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::Request(format!("status {status}: {detail}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| LlmError::Malformed("no completion content".to_string()))
    }
}

#[async_trait]
impl LlmClient for GroqClient {
    async fn transcript_insight(&self, transcript_text: &str) -> Result<String, LlmError> {
        let prompt = prompts::transcript_review(transcript_text);
        self.complete(&prompt, 1000).await
    }

    async fn icebreaker_analysis(
        &self,
        linkedin_bio: &str,
        pitch_deck: &str,
    ) -> Result<String, LlmError> {
        let prompt = prompts::icebreaker(linkedin_bio, pitch_deck);
        self.complete(&prompt, 2000).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_fails_at_call_time_not_construction() {
        let client = GroqClient::new(None);
        let err = client.transcript_insight("hello").await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
    }
}
