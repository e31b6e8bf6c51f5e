use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::debug;
use triage_core::ResponseTemplate;

use crate::advisor::{parse_advice, AdvisorError, ExternalAdvisor, SYSTEM_INSTRUCTION};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiRuntimeConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl OpenAiRuntimeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Calls the OpenAI Responses API and expects the advice object as output text.
#[derive(Debug, Clone)]
pub struct OpenAiAdvisor {
    http_client: Client,
    runtime: OpenAiRuntimeConfig,
    request_timeout: Duration,
}

impl OpenAiAdvisor {
    pub fn new(runtime: OpenAiRuntimeConfig, request_timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(6).min(request_timeout))
            .timeout(request_timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http_client,
            runtime,
            request_timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.runtime.model
    }
}

impl ExternalAdvisor for OpenAiAdvisor {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn try_external(&self, text: &str) -> Result<ResponseTemplate, AdvisorError> {
        if self.runtime.api_key.trim().is_empty() {
            return Err(AdvisorError::Unavailable);
        }

        let payload = serde_json::json!({
            "model": self.runtime.model,
            "temperature": 0.7,
            "max_output_tokens": 500,
            "input": [
                {
                    "role": "system",
                    "content": [
                        { "type": "input_text", "text": SYSTEM_INSTRUCTION }
                    ]
                },
                {
                    "role": "user",
                    "content": [
                        { "type": "input_text", "text": text }
                    ]
                }
            ],
            "text": {
                "format": { "type": "json_object" }
            }
        });

        let response = self
            .http_client
            .post(format!("{}/responses", self.runtime.base_url))
            .bearer_auth(self.runtime.api_key.as_str())
            .json(&payload)
            .send()
            .await
            .map_err(|error| self.transport_error(error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), body_len = body.len(), "openai non-success status");
            return Err(AdvisorError::Status(status.as_u16()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|error| AdvisorError::Malformed(format!("response body: {error}")))?;
        let output = extract_openai_output_text(&body)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AdvisorError::Malformed("output text missing".to_string()))?;

        parse_advice(&output)
    }
}

impl OpenAiAdvisor {
    fn transport_error(&self, error: reqwest::Error) -> AdvisorError {
        if error.is_timeout() {
            AdvisorError::TimedOut(self.request_timeout)
        } else {
            AdvisorError::Transport(error.to_string())
        }
    }
}

fn extract_openai_output_text(payload: &serde_json::Value) -> Option<String> {
    if let Some(value) = payload.get("output_text").and_then(|value| value.as_str()) {
        return Some(value.to_string());
    }
    let output = payload.get("output")?.as_array()?;
    let mut chunks = Vec::new();
    for item in output {
        if let Some(content) = item.get("content").and_then(|value| value.as_array()) {
            for content_item in content {
                if content_item
                    .get("type")
                    .and_then(|value| value.as_str())
                    .map(|value| value == "output_text")
                    .unwrap_or(false)
                {
                    if let Some(text) = content_item.get("text").and_then(|value| value.as_str()) {
                        chunks.push(text.to_string());
                    }
                }
            }
        }
    }
    if chunks.is_empty() {
        None
    } else {
        Some(chunks.join("\n"))
    }
}
