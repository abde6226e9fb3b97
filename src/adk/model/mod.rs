// SPDX-License-Identifier: MIT

//! Model module - defines LLM model trait and implementations
//!
//! This module provides the core Model trait and shared types.
//! Model implementations are in their own submodules:
//! - [anthropic] - Anthropic's Claude API
//! - [openai] - OpenAI's chat completions API (also Azure OpenAI deployments)

pub mod anthropic;
pub mod openai;

use crate::adk::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

impl GenerationConfig {
    /// Build a config from free-form definition parameters.
    ///
    /// Recognises `temperature`, `top_p` and `max_tokens` / `max_output_tokens`;
    /// anything else is ignored.
    pub fn from_parameters(parameters: &HashMap<String, serde_json::Value>) -> Self {
        let max_output_tokens = parameters
            .get("max_output_tokens")
            .or_else(|| parameters.get("max_tokens"))
            .and_then(|v| v.as_u64())
            .map(|v| v as u32);

        Self {
            temperature: parameters
                .get("temperature")
                .and_then(|v| v.as_f64())
                .map(|v| v as f32),
            max_output_tokens,
            top_p: parameters
                .get("top_p")
                .and_then(|v| v.as_f64())
                .map(|v| v as f32),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    /// Single-part text message
    pub fn text(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Concatenated text parts, thinking excluded
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::Thinking(_) => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Parts of a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Part {
    /// Regular text output from the model
    Text(String),
    /// Thinking/reasoning content from thinking models
    Thinking(String),
}

/// Core trait for LLM model implementations
#[async_trait]
pub trait Model: Send + Sync {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generation_config_from_parameters() {
        let mut params = HashMap::new();
        params.insert("temperature".to_string(), json!(0.0));
        params.insert("max_tokens".to_string(), json!(800));
        params.insert("unrelated".to_string(), json!("x"));

        let cfg = GenerationConfig::from_parameters(&params);
        assert_eq!(cfg.temperature, Some(0.0));
        assert_eq!(cfg.max_output_tokens, Some(800));
        assert_eq!(cfg.top_p, None);
        assert!(!cfg.is_empty());
    }

    #[test]
    fn test_joined_text_skips_thinking() {
        let content = Content {
            role: "model".to_string(),
            parts: vec![
                Part::Thinking("hmm".to_string()),
                Part::Text("Hello ".to_string()),
                Part::Text("there".to_string()),
            ],
        };
        assert_eq!(content.joined_text(), "Hello there");
    }
}
