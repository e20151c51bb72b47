//! External LLM provider implementations.
//!
//! OpenAI and Groq share the chat-completions format. Anthropic uses the
//! Messages API. Calls are single-shot; no retry happens here.

use std::time::Duration;

use async_trait::async_trait;
use keyplan_core::{Error, Result};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde_json::json;
use tracing::debug;

use crate::config::LLMConfig;
use crate::types::{ChatMessage, LLMProvider, Prompt};

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

/// Prompt-in, text-out language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String>;

    /// Model identifier for logs and reports.
    fn model_name(&self) -> String;
}

/// HTTP-backed language model for a resolved provider.
pub struct HttpLanguageModel {
    client: Client,
    provider: LLMProvider,
    model: String,
    api_key: String,
    endpoint: String,
}

impl HttpLanguageModel {
    pub fn new(provider: LLMProvider, model: String, api_key: String, timeout: Duration) -> Result<Self> {
        let endpoint = match provider {
            LLMProvider::OpenAI => OPENAI_CHAT_URL,
            LLMProvider::Groq => GROQ_CHAT_URL,
            LLMProvider::Anthropic => ANTHROPIC_MESSAGES_URL,
        };
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            provider,
            model,
            api_key,
            endpoint: endpoint.to_string(),
        })
    }

    /// Build from configuration; `Config` error when no provider has a key.
    pub fn from_config(config: &LLMConfig, timeout: Duration) -> Result<Self> {
        let (provider, model, api_key) = config
            .resolve_provider()
            .ok_or_else(|| Error::Config("No LLM provider configured".into()))?;
        Self::new(provider, model, api_key, timeout)
    }

    /// Point at a different endpoint (self-hosted gateways, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn provider(&self) -> LLMProvider {
        self.provider
    }
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let messages = prompt.messages();
        debug!("Requesting completion from {} with model {}", self.provider, self.model);

        match self.provider {
            LLMProvider::OpenAI | LLMProvider::Groq => {
                complete_openai_compat(&self.client, &self.endpoint, &messages, &self.model, &self.api_key, prompt)
                    .await
            }
            LLMProvider::Anthropic => {
                complete_anthropic(&self.client, &self.endpoint, &messages, &self.model, &self.api_key, prompt)
                    .await
            }
        }
    }

    fn model_name(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }
}

/// Complete against OpenAI-compatible APIs (OpenAI, Groq).
async fn complete_openai_compat(
    client: &Client,
    url: &str,
    messages: &[ChatMessage],
    model: &str,
    api_key: &str,
    prompt: &Prompt,
) -> Result<String> {
    let msgs: Vec<serde_json::Value> = messages
        .iter()
        .map(|m| json!({"role": m.role, "content": m.content}))
        .collect();
    let body = json!({
        "model": model,
        "messages": msgs,
        "temperature": prompt.temperature,
        "max_tokens": prompt.max_tokens,
    });

    let response = client
        .post(url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| Error::Generation(format!("Request failed: {}", e)))?;

    let parsed = read_json(response).await?;
    parsed["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::Generation("response has no message content".into()))
}

/// Complete against Anthropic's Messages API.
async fn complete_anthropic(
    client: &Client,
    url: &str,
    messages: &[ChatMessage],
    model: &str,
    api_key: &str,
    prompt: &Prompt,
) -> Result<String> {
    // Separate system message from conversation
    let system_msg: Option<&str> = messages
        .iter()
        .find(|m| m.role == "system")
        .map(|m| m.content.as_str());
    let conv_msgs: Vec<serde_json::Value> = messages
        .iter()
        .filter(|m| m.role != "system")
        .map(|m| json!({"role": m.role, "content": m.content}))
        .collect();

    let mut body = json!({
        "model": model,
        "messages": conv_msgs,
        "temperature": prompt.temperature,
        "max_tokens": prompt.max_tokens,
    });
    if let Some(sys) = system_msg {
        body["system"] = json!(sys);
    }

    let response = client
        .post(url)
        .header("x-api-key", api_key)
        .header("anthropic-version", "2023-06-01")
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| Error::Generation(format!("Request failed: {}", e)))?;

    let parsed = read_json(response).await?;
    let text: String = parsed["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b["type"] == "text")
                .filter_map(|b| b["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    if text.is_empty() {
        return Err(Error::Generation("response has no text content".into()));
    }
    Ok(text)
}

/// Map the HTTP status to the error taxonomy and parse the JSON body.
async fn read_json(response: Response) -> Result<serde_json::Value> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = parse_retry_after(
            response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
        );
        let body = response.text().await.unwrap_or_default();
        return Err(Error::RateLimited {
            message: format!("API error {}: {}", status, body),
            retry_after_secs,
        });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Generation(format!("API error {}: {}", status, body)));
    }
    response
        .json()
        .await
        .map_err(|e| Error::Generation(format!("invalid response body: {}", e)))
}

/// Delay-seconds form of `Retry-After`; only finite, non-negative values.
fn parse_retry_after(value: Option<&str>) -> Option<u64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(|s| s.ceil() as u64)
}
