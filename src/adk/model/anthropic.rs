// SPDX-License-Identifier: MIT

//! Anthropic Model - Claude messages API implementation

use super::{Content, GenerationConfig, Model, Part};
use crate::adk::error::ModelError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::env;

/// Anthropic Claude model implementation
pub struct AnthropicModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl AnthropicModel {
    /// Create a new AnthropicModel
    ///
    /// Requires `ANTHROPIC_API_KEY` environment variable to be set.
    /// Optionally uses `ANTHROPIC_BASE_URL` for custom endpoints.
    pub fn new(model_name: String) -> Result<Self, ModelError> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .map_err(|_| ModelError::ApiKeyMissing("Anthropic".into()))?;
        let base_url = env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
        })
    }

    /// Collect all system messages into one system prompt
    fn extract_system_message(history: &[Content]) -> Option<String> {
        let system: Vec<String> = history
            .iter()
            .filter(|c| c.role == "system")
            .map(Content::joined_text)
            .filter(|t| !t.is_empty())
            .collect();

        if system.is_empty() {
            None
        } else {
            Some(system.join("\n\n"))
        }
    }

    /// Convert the non-system history into Anthropic messages.
    ///
    /// The API requires alternating roles starting with `user`, so consecutive
    /// messages of the same role are merged and a leading assistant message
    /// gets a placeholder user turn in front of it.
    fn to_anthropic_messages(history: &[Content]) -> Vec<serde_json::Value> {
        let mut merged: Vec<(&'static str, String)> = Vec::new();

        for content in history.iter().filter(|c| c.role != "system") {
            let role = if content.role == "model" {
                "assistant"
            } else {
                "user"
            };
            let text = content.joined_text();
            if text.is_empty() {
                continue;
            }
            match merged.last_mut() {
                Some((last_role, last_text)) if *last_role == role => {
                    last_text.push_str("\n\n");
                    last_text.push_str(&text);
                }
                _ => merged.push((role, text)),
            }
        }

        if merged.first().is_some_and(|(role, _)| *role == "assistant") {
            merged.insert(0, ("user", "(conversation start)".to_string()));
        }

        merged
            .into_iter()
            .map(|(role, text)| {
                json!({
                    "role": role,
                    "content": [{ "type": "text", "text": text }]
                })
            })
            .collect()
    }

    /// Parse Anthropic response into Content
    fn parse_anthropic_response(response: &serde_json::Value) -> Result<Content, ModelError> {
        let content_blocks = response["content"]
            .as_array()
            .ok_or_else(|| ModelError::InvalidResponse("No content in Anthropic response".into()))?;

        let mut parts = Vec::new();

        for block in content_blocks {
            match block["type"].as_str() {
                Some("text") => {
                    if let Some(text) = block["text"].as_str() {
                        if !text.is_empty() {
                            parts.push(Part::Text(text.to_string()));
                        }
                    }
                }
                Some("thinking") => {
                    if let Some(thinking) = block["thinking"].as_str() {
                        if !thinking.is_empty() {
                            parts.push(Part::Thinking(thinking.to_string()));
                        }
                    }
                }
                _ => {}
            }
        }

        if let Some(stop_reason) = response["stop_reason"].as_str() {
            log::debug!("Anthropic stop reason: {}", stop_reason);
            if stop_reason == "refusal" {
                return Err(ModelError::ContentFiltered("model refused the request".into()));
            }
        }

        Ok(Content {
            role: "model".to_string(),
            parts,
        })
    }

    /// Map a non-success response to a ModelError
    fn classify_error(status: u16, retry_after: Option<u64>, body: &str) -> ModelError {
        if status == 429 {
            return ModelError::RateLimited {
                retry_after_secs: retry_after,
            };
        }
        let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
        let message = parsed["error"]["message"]
            .as_str()
            .unwrap_or(body)
            .to_string();
        ModelError::Api { status, message }
    }
}

#[async_trait]
impl Model for AnthropicModel {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, ModelError> {
        let url = format!("{}/messages", self.base_url);

        let mut body = json!({
            "model": self.model_name,
            "messages": Self::to_anthropic_messages(history),
            "max_tokens": config.and_then(|c| c.max_output_tokens).unwrap_or(4096)
        });

        if let Some(sys) = Self::extract_system_message(history) {
            body["system"] = json!(sys);
        }

        if let Some(cfg) = config {
            if let Some(temp) = cfg.temperature {
                body["temperature"] = json!(temp);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
        }

        log::debug!(
            "Anthropic request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let text = resp.text().await?;
            log::warn!("Anthropic API error ({}): {}", status, text);
            return Err(Self::classify_error(status.as_u16(), retry_after, &text));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("Anthropic response: {}", resp_json);

        Self::parse_anthropic_response(&resp_json)
    }
}
