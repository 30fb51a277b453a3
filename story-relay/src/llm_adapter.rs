use crate::fetcher::Fetcher;
use crate::types::{RelayError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// A two-message chat request: instructions plus the material to work on.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

/// Trait for text-generation collaborators
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Get the name of this LLM adapter
    fn adapter_name(&self) -> String;

    /// Return the first generated message for `prompt`
    async fn complete(&self, prompt: &ChatPrompt) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
        }
    }
}

/// Adapter for OpenAI-compatible chat completion endpoints
pub struct OpenAiAdapter {
    fetcher: Fetcher,
    config: OpenAiConfig,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiAdapter {
    pub fn new(fetcher: Fetcher, config: OpenAiConfig) -> Self {
        Self { fetcher, config }
    }
}

#[async_trait]
impl LlmAdapter for OpenAiAdapter {
    fn adapter_name(&self) -> String {
        format!("OpenAI-compatible ({})", self.config.model)
    }

    async fn complete(&self, prompt: &ChatPrompt) -> Result<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.config.temperature,
        };

        let endpoint = self.config.endpoint.as_str();
        let response = self
            .fetcher
            .send_with_retry(endpoint, || {
                self.fetcher
                    .client()
                    .post(endpoint)
                    .bearer_auth(&self.config.api_key)
                    .json(&body)
            })
            .await
            .map_err(|e| match e {
                RelayError::Auth(_) | RelayError::RateLimited { .. } => e,
                other => RelayError::Summarizer(other.to_string()),
            })?;

        let parsed: ChatResponse = serde_json::from_str(&response.text().await?)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| RelayError::Summarizer("completion was empty".to_string()))?;

        debug!("Completion returned {} chars", content.chars().count());
        Ok(content)
    }
}

/// Mock LLM adapter for development and testing.
///
/// Answers with scripted responses in order, then with a fixed fallback, and
/// remembers every prompt it was sent.
pub struct MockLlmAdapter {
    name: String,
    scripted: Mutex<VecDeque<Result<String>>>,
    fallback: String,
    prompts: Mutex<Vec<ChatPrompt>>,
}

impl MockLlmAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scripted: Mutex::new(VecDeque::new()),
            fallback: "Lively thread, mostly upbeat 🙂".to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push_response(&self, response: Result<String>) {
        if let Ok(mut scripted) = self.scripted.lock() {
            scripted.push_back(response);
        }
    }

    pub fn prompts(&self) -> Vec<ChatPrompt> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmAdapter for MockLlmAdapter {
    fn adapter_name(&self) -> String {
        format!("Mock LLM Adapter ({})", self.name)
    }

    async fn complete(&self, prompt: &ChatPrompt) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }
        let next = self.scripted.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}
