//! Chat-completion client used for incident diagnosis

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use sitecheck_common::LlmConfig;

use crate::error::TriageResult;

/// System turn sent with every diagnosis request
pub const SYSTEM_PROMPT: &str =
    "You are a pragmatic test-analysis assistant. Provide concise diagnostics and concrete steps.";

/// Something that can answer a diagnostic prompt
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Submit `prompt` and return the service's response body verbatim
    async fn complete(&self, prompt: &str) -> TriageResult<Value>;
}

/// OpenAI-compatible `/v1/chat/completions` client
pub struct ChatCompletionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatCompletionClient {
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> TriageResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn request_body(&self, prompt: &str) -> Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> TriageResult<Value> {
        debug!("POST {} (model {})", self.endpoint, self.model);

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        // Error bodies are kept as-is, like successful ones
        let status = resp.status();
        let body = resp.json::<Value>().await?;
        debug!("Completion service answered {}", status);
        Ok(body)
    }
}
