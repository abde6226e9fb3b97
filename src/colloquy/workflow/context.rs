// SPDX-License-Identifier: MIT

//! Prompt rendering from a run state
//!
//! Every step's input is derived here from the run state alone; steps never
//! see each other's outputs except through what is rendered.

use chrono::Utc;

use crate::adk::agent::PriorTurn;
use crate::adk::error::WorkflowError;
use crate::colloquy::state::{ChatMessage, FactCategory, Role, RunState, StepId, Turn};
use crate::colloquy::workflow::types::PromptSet;

/// Renders step prompts from the configured instruction texts
#[derive(Debug, Clone)]
pub struct ContextRenderer {
    prompts: PromptSet,
    finish_marker: String,
}

impl ContextRenderer {
    pub fn new(prompts: PromptSet, finish_marker: impl Into<String>) -> Self {
        Self {
            prompts,
            finish_marker: finish_marker.into(),
        }
    }

    pub fn finish_marker(&self) -> &str {
        &self.finish_marker
    }

    /// Session conversation (inbound message last) as agent prior turns
    pub fn prior_turns(&self, state: &RunState) -> Vec<PriorTurn> {
        conversation(state)
            .filter_map(|msg| match msg.role {
                Role::User => Some(PriorTurn::user(msg.content.clone())),
                Role::Writer => Some(PriorTurn::model(msg.content.clone())),
                other => {
                    log::warn!("Skipping message {} with role '{}' in prior turns", msg.id, other);
                    None
                }
            })
            .collect()
    }

    /// Prompt for the producer that drafts the interview context
    pub fn producer_prompt(&self, state: &RunState) -> String {
        let mut sections = vec![
            self.prompts.producer.clone(),
            profile_block(state),
            format!("The date is {}.", Utc::now()),
        ];
        if let Some(phase) = state.phase_prompt() {
            sections.push(format!("THIS IS THE CURRENT INTERVIEW PHASE\n{}", phase));
        }
        if let Some(review) = state.latest_review() {
            sections.push(format!("LATEST REVIEWER FEEDBACK\n{}", review.text));
        }
        sections.push(format!(
            "THIS IS THE INTERNAL CONVERSATION\n{}",
            transcript(state.turns(), "\n\n")
        ));
        sections.join("\n\n")
    }

    /// Prompt for the reviewer: its instructions followed by the internal log
    pub fn reviewer_prompt(&self, state: &RunState) -> String {
        format!(
            "{}\n\n{}",
            self.prompts.reviewer,
            transcript(state.turns(), "\n")
        )
    }

    /// Prompt for the publication step, built from the latest approved draft
    pub fn writer_prompt(&self, state: &RunState) -> Result<String, WorkflowError> {
        let draft = state.latest_draft().ok_or(WorkflowError::MissingDraft)?;
        let feedback = state
            .latest_review()
            .map(|t| t.text.as_str())
            .unwrap_or("none");
        let history = conversation(state)
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(format!(
            "{goal}\n{writer}\nWhen the interview is complete, end your message with {marker}\n\
             THIS IS THE CREATED INTERVIEW CONTEXT\n{draft}\n\
             LAST FEEDBACK ON INTERVIEW CONTEXT\n{feedback}\n\
             THIS IS THE INTERVIEW HISTORY\n{history}",
            goal = self.prompts.interview_goal,
            writer = self.prompts.writer,
            marker = self.finish_marker,
            draft = draft.text,
            feedback = feedback,
            history = history,
        ))
    }

    /// Prompt for the extraction call: the latest writer/user exchange
    pub fn extraction_prompt(&self, state: &RunState) -> String {
        let last_writer = state
            .history()
            .iter()
            .rev()
            .find(|m| m.role == Role::Writer);
        let exchange: Vec<&ChatMessage> = match last_writer {
            Some(writer) => vec![writer, state.inbound()],
            None => conversation(state).collect(),
        };
        let exchange = exchange
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "{}\n\nTHIS IS THE LATEST EXCHANGE\n{}",
            self.prompts.extraction, exchange
        )
    }

    /// Prompt for turning one extracted segment into a structured record
    pub fn parse_prompt(&self, category: FactCategory, segment: &str) -> String {
        let instructions = match category {
            FactCategory::Subject => &self.prompts.subject_parse,
            FactCategory::Organization => &self.prompts.organization_parse,
        };
        format!("{}\n\nSEGMENT:\n{}", instructions, segment)
    }
}

/// History followed by the inbound message
fn conversation(state: &RunState) -> impl Iterator<Item = &ChatMessage> {
    state
        .history()
        .iter()
        .chain(std::iter::once(state.inbound()))
}

/// Internal log in insertion order, one `role: text` entry per turn
fn transcript(turns: &[Turn], separator: &str) -> String {
    let mut ordered: Vec<&Turn> = turns.iter().collect();
    ordered.sort_by_key(|t| t.seq);
    ordered
        .iter()
        .filter(|t| t.step != StepId::Extractor)
        .map(|t| format!("{}: {}", t.role, t.text))
        .collect::<Vec<_>>()
        .join(separator)
}

fn profile_block(state: &RunState) -> String {
    let profile = state.profile();
    format!(
        "THIS IS THE USER PROVIDED INFORMATION ABOUT THE USER AND THE ORGANIZATION\n\
         - User description: {}\n\
         - Organization description: {}\n\n\
         THIS IS WHAT EARLIER SESSIONS DISTILLED\n\
         - About the user: {}\n\
         - About the organization: {}",
        profile.user_description,
        profile.organization_description,
        profile.distilled_subject_facts,
        profile.distilled_organization_facts,
    )
}
