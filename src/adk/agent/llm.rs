// SPDX-License-Identifier: MIT

//! LLM Agent - AgentPort backed by a single model call

use super::{AgentPort, PriorRole, PriorTurn};
use crate::adk::error::{ColloquyError, ModelError};
use crate::adk::model::{Content, GenerationConfig, Model};
use async_trait::async_trait;
use std::sync::Arc;

/// Standard LLM agent: optional system instruction, prior turns, then the
/// rendered prompt as the final user message.
pub struct LLMAgent {
    pub name: String,
    pub description: String,
    pub instruction: String,
    pub model: Arc<dyn Model>,
    pub config: GenerationConfig,
}

impl LLMAgent {
    pub fn new(
        name: String,
        description: String,
        instruction: String,
        model: Arc<dyn Model>,
    ) -> Self {
        Self {
            name,
            description,
            instruction,
            model,
            config: GenerationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    fn build_history(&self, prompt: &str, prior_turns: &[PriorTurn]) -> Vec<Content> {
        let mut history = Vec::with_capacity(prior_turns.len() + 2);
        if !self.instruction.trim().is_empty() {
            history.push(Content::text("system", self.instruction.clone()));
        }
        for turn in prior_turns {
            let role = match turn.role {
                PriorRole::User => "user",
                PriorRole::Model => "model",
            };
            history.push(Content::text(role, turn.text.clone()));
        }
        history.push(Content::text("user", prompt));
        history
    }
}

#[async_trait]
impl AgentPort for LLMAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        prompt: &str,
        prior_turns: &[PriorTurn],
    ) -> Result<String, ColloquyError> {
        let history = self.build_history(prompt, prior_turns);
        let config = if self.config.is_empty() {
            None
        } else {
            Some(&self.config)
        };

        log::info!(
            "Agent {} generating ({} prior turns, prompt length {})",
            self.name,
            prior_turns.len(),
            prompt.len()
        );

        let response = self
            .model
            .generate_content(&history, config)
            .await
            .map_err(|e| ColloquyError::generation(&self.name, e))?;

        let text = response.joined_text();
        if text.trim().is_empty() {
            log::warn!("Agent {} received empty response", self.name);
            return Err(ColloquyError::generation(
                &self.name,
                ModelError::InvalidResponse("empty text response".into()),
            ));
        }

        log::info!(
            "Agent {} returning text response (length: {}, preview: '{}')",
            self.name,
            text.len(),
            preview(&text, 100)
        );
        Ok(text)
    }
}

/// First `max` characters, cut on a char boundary
fn preview(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Model that records the history it was given
    struct RecordingModel {
        reply: Option<String>,
        seen: Mutex<Vec<Content>>,
    }

    #[async_trait]
    impl Model for RecordingModel {
        async fn generate_content(
            &self,
            history: &[Content],
            _config: Option<&GenerationConfig>,
        ) -> Result<Content, ModelError> {
            *self.seen.lock().unwrap() = history.to_vec();
            match &self.reply {
                Some(r) => Ok(Content::text("model", r.clone())),
                None => Err(ModelError::RateLimited {
                    retry_after_secs: Some(3),
                }),
            }
        }
    }

    fn agent(reply: Option<&str>, instruction: &str) -> (LLMAgent, Arc<RecordingModel>) {
        let model = Arc::new(RecordingModel {
            reply: reply.map(str::to_string),
            seen: Mutex::new(vec![]),
        });
        let agent = LLMAgent::new(
            "writer".to_string(),
            "test".to_string(),
            instruction.to_string(),
            model.clone(),
        );
        (agent, model)
    }

    #[tokio::test]
    async fn test_history_layout() {
        let (agent, model) = agent(Some("ok"), "You interview people.");
        let prior = vec![PriorTurn::model("Welcome!"), PriorTurn::user("Hi")];

        let out = agent.generate("CONTEXT", &prior).await.unwrap();
        assert_eq!(out, "ok");

        let seen = model.seen.lock().unwrap();
        let roles: Vec<&str> = seen.iter().map(|c| c.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "model", "user", "user"]);
        assert_eq!(seen[3].joined_text(), "CONTEXT");
    }

    #[tokio::test]
    async fn test_blank_instruction_is_omitted() {
        let (agent, model) = agent(Some("ok"), "   ");
        agent.generate("CONTEXT", &[]).await.unwrap();
        assert_eq!(model.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_model_error_becomes_generation_error() {
        let (agent, _) = agent(None, "");
        let err = agent.generate("x", &[]).await.unwrap_err();
        match err {
            ColloquyError::Generation { agent, source } => {
                assert_eq!(agent, "writer");
                assert!(matches!(source, ModelError::RateLimited { .. }));
            }
            other => panic!("Expected Generation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_reply_is_an_error() {
        let (agent, _) = agent(Some("  "), "");
        assert!(matches!(
            agent.generate("x", &[]).await,
            Err(ColloquyError::Generation { .. })
        ));
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("héllo", 2), "hé");
        assert_eq!(preview("hi", 10), "hi");
    }
}
