//! The external reasoning capability: prompt in, free-form text out.
//!
//! `OpenAiClient` speaks the OpenAI-compatible chat completions protocol
//! over blocking HTTP. Each call is a single attempt; retrying belongs to
//! the synthesizer.

use crate::{
    config::LlmConfig,
    error::{CallError, TriageError, TriageResult},
    prompt::Prompt,
};
use serde::Deserialize;
use serde_json::json;

pub trait ReasoningClient: Send + Sync {
    fn complete(&self, prompt: &Prompt) -> Result<String, CallError>;

    /// Model name for logs.
    fn model_name(&self) -> &str;
}

/// HTTP status → retry class. Rate limiting, request timeouts and
/// server-side failures are transient; every other non-success is fatal.
pub fn classify_status(status: u16, body: &str) -> CallError {
    let detail = format!("HTTP {status}: {}", excerpt(body));
    match status {
        408 | 429 | 500..=599 => CallError::Transient(detail),
        _ => CallError::Fatal(detail),
    }
}

/// Failures before a complete body arrives. Only a request that could not
/// be built is fatal; timeouts, refused connections and resets are retried.
fn classify_transport(e: reqwest::Error) -> CallError {
    if e.is_builder() {
        CallError::Fatal(format!("invalid request: {e}"))
    } else if e.is_timeout() {
        CallError::Transient(format!("timed out: {e}"))
    } else {
        CallError::Transient(e.to_string())
    }
}

fn excerpt(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(MAX).collect();
        format!("{head}...")
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(cfg: &LlmConfig) -> TriageResult<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| TriageError::Other(anyhow::anyhow!("LLM API key is not set")))?;
        let http = reqwest::blocking::Client::builder()
            .timeout(cfg.timeout())
            .build()
            .map_err(|e| TriageError::Other(anyhow::anyhow!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_url: cfg.api_url.clone(),
            api_key,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            max_tokens: cfg.max_tokens,
        })
    }
}

impl ReasoningClient for OpenAiClient {
    fn complete(&self, prompt: &Prompt) -> Result<String, CallError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
            "temperature": self.temperature,
            "top_p": self.top_p,
            "max_tokens": self.max_tokens,
        });

        let resp = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(classify_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(classify_status(status.as_u16(), &text));
        }

        // The whole body is received before it is interpreted, so a stall or
        // reset mid-body is a transport failure, not a malformed reply.
        let raw = resp.bytes().map_err(classify_transport)?;

        let parsed: ChatResponse = serde_json::from_slice(&raw)
            .map_err(|e| CallError::Fatal(format!("unreadable response body: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CallError::Fatal("response carried no message content".into()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
