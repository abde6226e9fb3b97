// SPDX-License-Identifier: MIT

//! Agent module - the capability interface every workflow step talks to
//!
//! - `AgentPort` - one callable text-generation agent
//! - `LLMAgent` - AgentPort backed by a [`Model`](crate::adk::model::Model)

mod llm;

pub use llm::LLMAgent;

use crate::adk::error::ColloquyError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Who produced a prior turn, from the agent's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorRole {
    User,
    Model,
}

/// One role-tagged turn of earlier conversation handed to an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorTurn {
    pub role: PriorRole,
    pub text: String,
}

impl PriorTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: PriorRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: PriorRole::Model,
            text: text.into(),
        }
    }
}

/// A callable text-generation agent.
///
/// `prompt` is the fully rendered instruction/context string for this call;
/// `prior_turns` is the ordered earlier conversation. The returned text is
/// opaque to the caller. Implementations fail with
/// [`ColloquyError::Generation`] when the backend call fails.
#[async_trait]
pub trait AgentPort: Send + Sync {
    /// Returns the agent name
    fn name(&self) -> &str;

    /// Generate text for the given prompt and prior turns
    async fn generate(
        &self,
        prompt: &str,
        prior_turns: &[PriorTurn],
    ) -> Result<String, ColloquyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple agent that echoes its prompt (used in tests)
    struct EchoAgent {
        name: String,
    }

    #[async_trait]
    impl AgentPort for EchoAgent {
        fn name(&self) -> &str {
            &self.name
        }

        async fn generate(
            &self,
            prompt: &str,
            prior_turns: &[PriorTurn],
        ) -> Result<String, ColloquyError> {
            Ok(format!("{}|{}", prior_turns.len(), prompt))
        }
    }

    #[tokio::test]
    async fn test_echo_agent_through_trait_object() {
        let agent: Box<dyn AgentPort> = Box::new(EchoAgent {
            name: "echo".to_string(),
        });
        assert_eq!(agent.name(), "echo");

        let turns = vec![PriorTurn::user("hi"), PriorTurn::model("hello")];
        let result = agent.generate("ctx", &turns).await.unwrap();
        assert_eq!(result, "2|ctx");
    }

    #[test]
    fn test_prior_role_serde() {
        let json = serde_json::to_string(&PriorTurn::model("x")).unwrap();
        assert!(json.contains("\"model\""));
    }
}
