// SPDX-License-Identifier: MIT

//! OpenAI Model - chat completions API implementation
//!
//! The same wire format serves Azure OpenAI deployments; only the URL and
//! the auth header differ.

use super::{Content, GenerationConfig, Model, Part};
use crate::adk::error::ModelError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::env;

const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";

/// Where requests go and how they authenticate
#[derive(Debug, Clone, PartialEq)]
enum Endpoint {
    OpenAI { base_url: String },
    Azure { endpoint: String, api_version: String },
}

/// OpenAI chat model implementation
pub struct OpenAIModel {
    client: Client,
    api_key: String,
    model_name: String,
    endpoint: Endpoint,
}

impl OpenAIModel {
    /// Create a new OpenAIModel
    ///
    /// Requires `OPENAI_API_KEY` environment variable to be set.
    /// Optionally uses `OPENAI_BASE_URL` for custom endpoints.
    pub fn new(model_name: String) -> Result<Self, ModelError> {
        let api_key =
            env::var("OPENAI_API_KEY").map_err(|_| ModelError::ApiKeyMissing("OpenAI".into()))?;
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            endpoint: Endpoint::OpenAI { base_url },
        })
    }

    /// Create a model bound to an Azure OpenAI deployment
    ///
    /// Requires `AZURE_OPENAI_ENDPOINT` and `AZURE_OPENAI_API_KEY`;
    /// `AZURE_OPENAI_API_VERSION` is optional.
    pub fn azure(deployment: String) -> Result<Self, ModelError> {
        let api_key = env::var("AZURE_OPENAI_API_KEY")
            .map_err(|_| ModelError::ApiKeyMissing("Azure".into()))?;
        let endpoint = env::var("AZURE_OPENAI_ENDPOINT")
            .map_err(|_| ModelError::ApiKeyMissing("Azure (AZURE_OPENAI_ENDPOINT)".into()))?;
        let api_version = env::var("AZURE_OPENAI_API_VERSION")
            .unwrap_or_else(|_| DEFAULT_AZURE_API_VERSION.to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name: deployment,
            endpoint: Endpoint::Azure {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                api_version,
            },
        })
    }

    fn url(&self) -> String {
        match &self.endpoint {
            Endpoint::OpenAI { base_url } => format!("{}/chat/completions", base_url),
            Endpoint::Azure {
                endpoint,
                api_version,
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint, self.model_name, api_version
            ),
        }
    }

    /// Convert internal Content to OpenAI message format
    fn content_to_openai_message(content: &Content) -> serde_json::Value {
        let role = match content.role.as_str() {
            "system" => "system",
            "user" => "user",
            "model" => "assistant",
            other => other,
        };

        json!({
            "role": role,
            "content": content.joined_text()
        })
    }

    /// Parse OpenAI response into Content
    fn parse_openai_response(response: &serde_json::Value) -> Result<Content, ModelError> {
        let choice = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| ModelError::InvalidResponse("No choices in OpenAI response".into()))?;

        if choice["finish_reason"].as_str() == Some("content_filter") {
            return Err(ModelError::ContentFiltered(
                "completion stopped by content filter".into(),
            ));
        }

        let mut parts = Vec::new();
        if let Some(content) = choice["message"]["content"].as_str() {
            if !content.is_empty() {
                parts.push(Part::Text(content.to_string()));
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
        let error = parsed.get("error").unwrap_or(&parsed);
        let code = error["code"].as_str().unwrap_or_default();
        let message = error["message"].as_str().unwrap_or(body).to_string();

        if code == "content_filter" || code == "content_policy_violation" {
            ModelError::ContentFiltered(message)
        } else {
            ModelError::Api { status, message }
        }
    }

    fn build_body(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = history
            .iter()
            .map(Self::content_to_openai_message)
            .collect();

        let mut body = json!({ "messages": messages });
        if let Endpoint::OpenAI { .. } = self.endpoint {
            body["model"] = json!(self.model_name);
        }

        if let Some(cfg) = config {
            if let Some(temp) = cfg.temperature {
                body["temperature"] = json!(temp);
            }
            if let Some(max_tokens) = cfg.max_output_tokens {
                body["max_tokens"] = json!(max_tokens);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
        }
        body
    }
}

#[async_trait]
impl Model for OpenAIModel {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, ModelError> {
        let body = self.build_body(history, config);

        log::debug!(
            "OpenAI request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let request = self.client.post(self.url()).json(&body);
        let request = match self.endpoint {
            Endpoint::OpenAI { .. } => {
                request.header("Authorization", format!("Bearer {}", self.api_key))
            }
            Endpoint::Azure { .. } => request.header("api-key", &self.api_key),
        };

        let resp = request.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let text = resp.text().await?;
            log::warn!("OpenAI API error ({}): {}", status, text);
            return Err(Self::classify_error(status.as_u16(), retry_after, &text));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("OpenAI response: {}", resp_json);

        Self::parse_openai_response(&resp_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model_with(endpoint: Endpoint) -> OpenAIModel {
        OpenAIModel {
            client: Client::new(),
            api_key: "test".to_string(),
            model_name: "gpt-4o".to_string(),
            endpoint,
        }
    }

    #[test]
    fn test_content_to_openai_roles() {
        let user = OpenAIModel::content_to_openai_message(&Content::text("user", "Hello"));
        assert_eq!(user["role"], "user");
        assert_eq!(user["content"], "Hello");

        let system = OpenAIModel::content_to_openai_message(&Content::text("system", "Be brief"));
        assert_eq!(system["role"], "system");

        let model = OpenAIModel::content_to_openai_message(&Content::text("model", "Sure"));
        assert_eq!(model["role"], "assistant");
    }

    #[test]
    fn test_parse_openai_text_response() {
        let response = json!({
            "choices": [{
                "message": { "role": "assistant", "content": "What does your team do?" },
                "finish_reason": "stop"
            }]
        });

        let content = OpenAIModel::parse_openai_response(&response).unwrap();
        assert_eq!(content.role, "model");
        assert_eq!(content.joined_text(), "What does your team do?");
    }

    #[test]
    fn test_parse_openai_content_filter_finish() {
        let response = json!({
            "choices": [{ "message": { "content": null }, "finish_reason": "content_filter" }]
        });

        let err = OpenAIModel::parse_openai_response(&response).unwrap_err();
        assert!(matches!(err, ModelError::ContentFiltered(_)));
    }

    #[test]
    fn test_parse_openai_no_choices() {
        let err = OpenAIModel::parse_openai_response(&json!({"choices": []})).unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = OpenAIModel::classify_error(429, Some(7), "{}");
        match err {
            ModelError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, Some(7)),
            other => panic!("Expected RateLimited, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_content_filter() {
        let body = r#"{"error": {"code": "content_filter", "message": "filtered"}}"#;
        let err = OpenAIModel::classify_error(400, None, body);
        assert!(matches!(err, ModelError::ContentFiltered(m) if m == "filtered"));
    }

    #[test]
    fn test_classify_other_status() {
        let err = OpenAIModel::classify_error(500, None, "upstream exploded");
        match err {
            ModelError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("Expected Api, got {:?}", other),
        }
    }

    #[test]
    fn test_urls_and_body_per_endpoint() {
        let openai = model_with(Endpoint::OpenAI {
            base_url: "https://api.openai.com/v1".to_string(),
        });
        assert_eq!(openai.url(), "https://api.openai.com/v1/chat/completions");
        let body = openai.build_body(&[Content::text("user", "hi")], None);
        assert_eq!(body["model"], "gpt-4o");

        let azure = model_with(Endpoint::Azure {
            endpoint: "https://example.openai.azure.com".to_string(),
            api_version: "2024-06-01".to_string(),
        });
        assert_eq!(
            azure.url(),
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-06-01"
        );
        let cfg = GenerationConfig {
            temperature: Some(0.0),
            ..Default::default()
        };
        let body = azure.build_body(&[Content::text("user", "hi")], Some(&cfg));
        assert!(body.get("model").is_none());
        assert_eq!(body["temperature"], 0.0);
    }
}
