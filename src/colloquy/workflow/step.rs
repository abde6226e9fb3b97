// SPDX-License-Identifier: MIT

//! StepExecutor - one agent call turned into one recorded turn

use std::sync::Arc;

use crate::adk::agent::{AgentPort, PriorTurn};
use crate::adk::error::ColloquyError;
use crate::colloquy::state::{Role, RunState, StepId, StepOutput, Turn};

/// Rendered input for one step invocation
#[derive(Debug, Clone, Default)]
pub struct StepInput {
    pub prompt: String,
    pub prior_turns: Vec<PriorTurn>,
}

impl StepInput {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            prior_turns: Vec::new(),
        }
    }

    pub fn with_prior_turns(mut self, prior_turns: Vec<PriorTurn>) -> Self {
        self.prior_turns = prior_turns;
        self
    }
}

/// Runs a named step against an agent and records the result.
///
/// Exactly one agent call per invocation. On failure the run state is left
/// untouched and the error is returned to the caller.
#[derive(Clone)]
pub struct StepExecutor {
    step: StepId,
    role: Role,
    agent: Arc<dyn AgentPort>,
}

impl StepExecutor {
    pub fn new(step: StepId, role: Role, agent: Arc<dyn AgentPort>) -> Self {
        Self { step, role, agent }
    }

    pub fn step(&self) -> StepId {
        self.step
    }

    pub fn agent_name(&self) -> &str {
        self.agent.name()
    }

    /// Call the agent and wrap its text, without touching any run state
    pub async fn draft(&self, input: &StepInput) -> Result<StepOutput, ColloquyError> {
        log::debug!(
            "Step {} calling agent '{}'",
            self.step,
            self.agent.name()
        );
        let text = self
            .agent
            .generate(&input.prompt, &input.prior_turns)
            .await
            .inspect_err(|e| log::warn!("Step {} failed: {}", self.step, e))?;
        Ok(StepOutput::new(self.step, self.role, text))
    }

    /// Call the agent and append the output to `state`
    pub async fn execute<'s>(
        &self,
        state: &'s mut RunState,
        input: &StepInput,
    ) -> Result<&'s Turn, ColloquyError> {
        let output = self.draft(input).await?;
        Ok(state.commit(output))
    }
}
