use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use mabar_core::config::{LlmConfig, LlmProvider};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model transport failure: {0}")]
    Transport(String),
    #[error("model endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model returned an empty completion")]
    EmptyCompletion,
    #[error("completion could not be decoded: {0}")]
    Decode(String),
    #[error("llm configuration invalid: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Transport-level failures may be retried; decode failures never are -
    /// they fall through to the caller's deterministic fallback.
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Status { status: 500..=599, .. }
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// One role/parts pair of the hosted model's `contents` array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: "user".to_string(), parts: vec![Part { text: text.into() }] }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: "model".to_string(), parts: vec![Part { text: text.into() }] }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub contents: Vec<Content>,
}

impl ChatRequest {
    pub fn new(contents: Vec<Content>) -> Self {
        Self { contents }
    }

    /// Flatten the turns into one prompt, for providers without a multi-turn
    /// contents surface.
    pub fn flattened(&self) -> String {
        self.contents
            .iter()
            .flat_map(|content| content.parts.iter().map(|part| part.text.as_str()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, request: &ChatRequest) -> Result<String, LlmError>;
}

/// Strip ```json fences the model wraps its payload in.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Decode a model completion that claims to carry JSON. The fence markers
/// are stripped first; anything that still fails to decode is reported as a
/// decode error for the caller's fallback path.
pub fn parse_model_json<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let cleaned = strip_code_fences(text);
    serde_json::from_str(&cleaned).map_err(|error| LlmError::Decode(error.to_string()))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct RetryPolicy {
    max_retries: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Hosted Gemini-style REST client.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: SecretString,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| LlmError::Configuration("gemini requires llm.api_key".to_string()))?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string());

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            retry: RetryPolicy { max_retries: config.max_retries, ..RetryPolicy::default() },
        })
    }

    async fn try_generate(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&json!({"contents": request.contents}))
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        if !status.is_success() {
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let envelope: GenerateResponse =
            serde_json::from_str(&body).map_err(|error| LlmError::Decode(error.to_string()))?;
        let text = envelope
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyCompletion);
        }
        Ok(text)
    }
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<Part>,
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self.try_generate(request).await {
                Ok(text) => return Ok(text),
                Err(error) if error.is_retryable() && attempt < self.retry.max_retries => {
                    debug!(
                        event_name = "llm.request.retry",
                        attempt,
                        error = %error,
                        "retrying model call after transport failure"
                    );
                    tokio::time::sleep(self.retry.backoff(attempt)).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Local Ollama endpoint; the multi-turn contents are flattened into one
/// prompt because its generate API is single-shot.
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| LlmError::Configuration("ollama requires llm.base_url".to_string()))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&json!({
                "model": self.model,
                "prompt": request.flattened(),
                "stream": false,
            }))
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;
        if !status.is_success() {
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let envelope: OllamaResponse =
            serde_json::from_str(&body).map_err(|error| LlmError::Decode(error.to_string()))?;
        if envelope.response.trim().is_empty() {
            return Err(LlmError::EmptyCompletion);
        }
        Ok(envelope.response)
    }
}

/// Provider-selected client for the configured endpoint.
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    match config.provider {
        LlmProvider::Gemini => Ok(Arc::new(GeminiClient::from_config(config)?)),
        LlmProvider::Ollama => Ok(Arc::new(OllamaClient::from_config(config)?)),
    }
}

/// Test double that replays a script of completions and records every
/// request it was given.
#[derive(Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlmClient {
    pub fn with_replies(replies: Vec<Result<String, LlmError>>) -> Self {
        Self { replies: Mutex::new(replies.into()), requests: Mutex::new(Vec::new()) }
    }

    pub fn replying(texts: Vec<&str>) -> Self {
        Self::with_replies(texts.into_iter().map(|text| Ok(text.to_string())).collect())
    }

    pub async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn generate(&self, request: &ChatRequest) -> Result<String, LlmError> {
        self.requests.lock().await.push(request.clone());
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Transport("scripted replies exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{
        parse_model_json, strip_code_fences, ChatRequest, Content, LlmClient, LlmError,
        RetryPolicy, ScriptedLlmClient,
    };

    #[test]
    fn fence_markers_are_stripped_before_decoding() {
        let fenced = "```json\n{\"intent\": \"find_venue\"}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"intent\": \"find_venue\"}");

        let value: Value = parse_model_json(fenced).expect("fenced json decodes");
        assert_eq!(value["intent"], "find_venue");
    }

    #[test]
    fn prose_without_braces_is_a_decode_error() {
        let result = parse_model_json::<Value>("Sure! Let me find you a court.");
        assert!(matches!(result, Err(LlmError::Decode(_))));
    }

    #[test]
    fn retry_policy_backoff_is_bounded() {
        let policy = RetryPolicy { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 };
        assert_eq!(policy.backoff(0).as_millis(), 250);
        assert_eq!(policy.backoff(1).as_millis(), 500);
        assert_eq!(policy.backoff(10).as_millis(), 5_000);
    }

    #[test]
    fn retryable_errors_are_transport_and_5xx_only() {
        assert!(LlmError::Transport("reset".to_string()).is_retryable());
        assert!(LlmError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(!LlmError::Status { status: 400, body: String::new() }.is_retryable());
        assert!(!LlmError::Decode("bad json".to_string()).is_retryable());
    }

    #[tokio::test]
    async fn scripted_client_replays_and_records() {
        let client = ScriptedLlmClient::replying(vec!["first", "second"]);
        let request = ChatRequest::new(vec![Content::user("hello")]);

        assert_eq!(client.generate(&request).await.expect("first"), "first");
        assert_eq!(client.generate(&request).await.expect("second"), "second");
        assert!(client.generate(&request).await.is_err(), "script exhausted");

        let seen = client.requests().await;
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].contents[0].parts[0].text, "hello");
    }

    #[test]
    fn flattened_request_joins_all_parts() {
        let request = ChatRequest::new(vec![
            Content::user("system prompt"),
            Content::model("understood"),
            Content::user("find courts"),
        ]);
        let flattened = request.flattened();
        assert!(flattened.starts_with("system prompt"));
        assert!(flattened.ends_with("find courts"));
    }
}
