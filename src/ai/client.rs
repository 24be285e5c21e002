use std::sync::LazyLock;

use regex::Regex;
use reqwest::{Client, StatusCode};
use serde_json::{Value as JsonValue, json};

use crate::{ai::AiError, config::AiConfig};

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("fenced json pattern is valid")
});

/// Thin client for an OpenAI-compatible chat-completions endpoint that is
/// asked to answer in JSON.
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    config: AiConfig,
}

impl LlmClient {
    pub fn new(config: AiConfig, http: Client) -> Self {
        Self { http, config }
    }

    /// Sends one system + user exchange and parses the reply as JSON.
    pub async fn chat_json(
        &self,
        system_prompt: &str,
        user_content: &str,
        temperature: f32,
    ) -> Result<JsonValue, AiError> {
        let payload = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_content}
            ],
            "response_format": { "type": "json_object" },
            "temperature": temperature
        });

        let endpoint = format!(
            "{}/chat/completions",
            self.config.base_url.as_str().trim_end_matches('/')
        );

        tracing::debug!(model = %self.config.model, "Sending chat completion request");
        let res = self
            .http
            .post(endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .timeout(self.config.timeout)
            .send()
            .await?;

        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AiError::RateLimited);
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AiError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let body: JsonValue = res.json().await?;
        let content = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| AiError::Malformed("response has no message content".to_string()))?;

        parse_json_content(content)
    }
}

/// Parses model output as JSON, tolerating a surrounding Markdown code fence.
pub fn parse_json_content(content: &str) -> Result<JsonValue, AiError> {
    let trimmed = content.trim();
    let inner = FENCED_JSON
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());
    Ok(serde_json::from_str(inner)?)
}
