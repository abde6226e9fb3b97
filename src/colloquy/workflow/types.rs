// SPDX-License-Identifier: MIT

//! YAML schema types for orchestrator configuration
//!
//! One file describes the four agents of an interview run, the instruction
//! texts rendered into their prompts, and the review/session settings.

use crate::adk::error::WorkflowError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_MAX_ITERATIONS: u32 = 2;
pub const DEFAULT_HISTORY_LIMIT: usize = 30;
pub const DEFAULT_FINISH_MARKER: &str = "[SESSION_FINISHED]";

/// Top-level orchestrator definition
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OrchestratorDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub agents: AgentSet,
    #[serde(default)]
    pub prompts: PromptSet,
    #[serde(default)]
    pub review: ReviewSettings,
    #[serde(default)]
    pub session: SessionSettings,
}

impl OrchestratorDefinition {
    pub fn validate(&self) -> Result<(), WorkflowError> {
        self.review.validate()
    }
}

/// The agent behind each step
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentSet {
    pub extractor: AgentDefinition,
    pub producer: AgentDefinition,
    pub reviewer: AgentDefinition,
    pub writer: AgentDefinition,
}

/// Agent definition
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// System instruction sent with every call
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub model: ModelDefinition,
}

/// Model configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ModelDefinition {
    /// Provider is optional - can be inferred from model_name or MODEL_PROVIDER env var
    pub provider: Option<String>,
    pub model_name: Option<String>,
    pub parameters: Option<HashMap<String, serde_json::Value>>,
}

/// Instruction texts rendered into step prompts
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PromptSet {
    /// What the interview is trying to achieve
    pub interview_goal: String,
    pub extraction: String,
    pub subject_parse: String,
    pub organization_parse: String,
    pub producer: String,
    pub reviewer: String,
    pub writer: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            interview_goal: "Conduct a friendly interview that uncovers how ready the \
                interviewee's organization is to adopt new technology. Ask one question at a time."
                .to_string(),
            extraction: "Extract every segment of the latest exchange that says something about \
                the organization or about the user. Output one segment per line, prefixed with \
                [Company Info] or [User Info]. Output nothing else."
                .to_string(),
            subject_parse: "Turn the user's segment into a JSON object with exactly the keys \
                \"topic\" (a few words), \"score\" (0 to 1, perceived expertise), \"relevance\" \
                (0 to 1) and \"themes\" (array of labels). Return only the JSON."
                .to_string(),
            organization_parse: "Turn the company segment into a JSON object with exactly the keys \
                \"description\" (a few words), \"score\" (0 to 1, perceived maturity), \"relevance\" \
                (0 to 1) and \"themes\" (array of labels). Return only the JSON."
                .to_string(),
            producer: "Build the context the interviewer needs for its next message: what is \
                known, what is missing and which single question should come next."
                .to_string(),
            reviewer: "Review the interview context. End with a line \
                'Reviewer Verdict: APPROVE' or 'Reviewer Verdict: REVISE' followed by feedback."
                .to_string(),
            writer: "Write the interviewer's next message from the approved context."
                .to_string(),
        }
    }
}

/// Review loop settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ReviewSettings {
    /// Total reviewer invocations before approval is forced
    pub max_iterations: u32,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl ReviewSettings {
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.max_iterations == 0 {
            return Err(WorkflowError::InvalidIterationCap(self.max_iterations));
        }
        Ok(())
    }
}

/// Session settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    /// Most recent user/writer messages loaded into a run
    pub history_limit: usize,
    /// Marker the writer emits to close the session
    pub finish_marker: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            finish_marker: DEFAULT_FINISH_MARKER.to_string(),
        }
    }
}
