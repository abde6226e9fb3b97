// SPDX-License-Identifier: MIT

//! Agent factory - constructs agents from definitions
//!
//! Resolves the model backend for each AgentDefinition and wraps it in an
//! `LLMAgent` carrying the definition's instructions and parameters.

use crate::adk::agent::{AgentPort, LLMAgent};
use crate::adk::error::{ColloquyError, WorkflowError};
use crate::adk::model::anthropic::AnthropicModel;
use crate::adk::model::openai::OpenAIModel;
use crate::adk::model::{GenerationConfig, Model};
use crate::colloquy::workflow::types::AgentDefinition;

use std::env;
use std::sync::Arc;

const DEFAULT_MODEL_NAME: &str = "gpt-4o";

/// Supported generation backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Azure,
    Anthropic,
}

impl Provider {
    pub fn parse(name: &str) -> Result<Self, WorkflowError> {
        match name.to_lowercase().as_str() {
            "openai" | "" => Ok(Provider::OpenAI),
            "azure" | "azureopenai" | "azure_openai" => Ok(Provider::Azure),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            _ => Err(WorkflowError::UnknownProvider(name.to_string())),
        }
    }
}

/// Factory for creating AgentPort instances from definitions
#[derive(Debug, Default)]
pub struct AgentFactory;

impl AgentFactory {
    pub fn new() -> Self {
        Self
    }

    /// Build an agent from an AgentDefinition
    pub fn build(&self, def: &AgentDefinition) -> Result<Arc<dyn AgentPort>, ColloquyError> {
        let model = self.create_model(def)?;
        let config = def
            .model
            .parameters
            .as_ref()
            .map(GenerationConfig::from_parameters)
            .unwrap_or_default();

        log::info!("Building agent '{}'", def.name);
        Ok(Arc::new(
            LLMAgent::new(
                def.name.clone(),
                def.description.clone(),
                def.instructions.clone(),
                model,
            )
            .with_config(config),
        ))
    }

    /// Create the model instance for an agent
    fn create_model(&self, def: &AgentDefinition) -> Result<Arc<dyn Model>, ColloquyError> {
        let model_name = def.model.model_name.clone().unwrap_or_else(|| {
            env::var("MODEL_NAME").unwrap_or_else(|_| DEFAULT_MODEL_NAME.to_string())
        });
        let provider = resolve_provider(def.model.provider.as_deref(), &model_name)?;

        log::debug!("Using provider '{:?}' with model '{}'", provider, model_name);

        let model: Arc<dyn Model> = match provider {
            Provider::OpenAI => Arc::new(OpenAIModel::new(model_name).map_err(config_error)?),
            Provider::Azure => Arc::new(OpenAIModel::azure(model_name).map_err(config_error)?),
            Provider::Anthropic => Arc::new(AnthropicModel::new(model_name).map_err(config_error)?),
        };
        Ok(model)
    }
}

fn config_error(err: impl std::fmt::Display) -> ColloquyError {
    ColloquyError::config(err.to_string())
}

/// Pick the provider: explicit definition > MODEL_PROVIDER env > model name prefix
pub fn resolve_provider(
    explicit: Option<&str>,
    model_name: &str,
) -> Result<Provider, WorkflowError> {
    match explicit {
        Some(name) => Provider::parse(name),
        None => match env::var("MODEL_PROVIDER") {
            Ok(name) => Provider::parse(&name),
            Err(_) => Ok(infer_provider_from_model(model_name)),
        },
    }
}

/// Infer the provider from the model name prefix
pub fn infer_provider_from_model(model_name: &str) -> Provider {
    let name_lower = model_name.to_lowercase();
    if name_lower.starts_with("claude") {
        Provider::Anthropic
    } else {
        // gpt-*, o1-*, o3-* and anything unknown
        Provider::OpenAI
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colloquy::workflow::types::ModelDefinition;

    #[test]
    fn test_infer_provider_openai() {
        assert_eq!(infer_provider_from_model("gpt-4o"), Provider::OpenAI);
        assert_eq!(infer_provider_from_model("GPT-4"), Provider::OpenAI);
        assert_eq!(infer_provider_from_model("o1-mini"), Provider::OpenAI);
    }

    #[test]
    fn test_infer_provider_anthropic() {
        assert_eq!(infer_provider_from_model("claude-3-opus"), Provider::Anthropic);
        assert_eq!(infer_provider_from_model("Claude-3.5-Sonnet"), Provider::Anthropic);
    }

    #[test]
    fn test_infer_provider_unknown_defaults_to_openai() {
        assert_eq!(infer_provider_from_model("my-custom-model"), Provider::OpenAI);
        assert_eq!(infer_provider_from_model(""), Provider::OpenAI);
    }

    #[test]
    fn test_parse_provider_names() {
        assert_eq!(Provider::parse("Azure").unwrap(), Provider::Azure);
        assert_eq!(Provider::parse("anthropic").unwrap(), Provider::Anthropic);
        assert_eq!(Provider::parse("OpenAI").unwrap(), Provider::OpenAI);
        assert!(matches!(
            Provider::parse("Gemini"),
            Err(WorkflowError::UnknownProvider(p)) if p == "Gemini"
        ));
    }

    #[test]
    fn test_explicit_provider_wins_over_name() {
        assert_eq!(
            resolve_provider(Some("Azure"), "claude-3-opus").unwrap(),
            Provider::Azure
        );
    }

    #[test]
    fn test_build_unknown_provider_fails() {
        let def = AgentDefinition {
            name: "Writer".to_string(),
            description: String::new(),
            instructions: String::new(),
            model: ModelDefinition {
                provider: Some("Mystery".to_string()),
                model_name: Some("m".to_string()),
                parameters: None,
            },
        };
        let err = AgentFactory::new().build(&def).err().unwrap();
        assert!(matches!(
            err,
            ColloquyError::Workflow(WorkflowError::UnknownProvider(_))
        ));
    }
}
