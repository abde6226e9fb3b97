// SPDX-License-Identifier: MIT

//! Runtime state for one workflow execution

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::types::{
    ApprovalKind, ChatMessage, ExtractedFact, FactCategory, ProfileSnapshot, Role, StateField,
    StepId, Turn,
};

/// Text produced by one step, not yet part of any run state
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub step: StepId,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl StepOutput {
    pub fn new(step: StepId, role: Role, text: impl Into<String>) -> Self {
        Self {
            step,
            role,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// Facts produced by the extraction step, applied in one go
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionDelta {
    pub facts: Vec<ExtractedFact>,
}

impl ExtractionDelta {
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// The record shared by every step of one workflow execution.
///
/// Created fresh per inbound message and owned by a single runner. Fields
/// are private: steps can only append turns and facts or raise the
/// `approved` and `finished` flags, never remove anything.
#[derive(Debug, Clone)]
pub struct RunState {
    session_id: String,
    user_id: String,
    inbound: ChatMessage,
    profile: ProfileSnapshot,
    history: Vec<ChatMessage>,
    phase_prompt: Option<String>,
    turns: Vec<Turn>,
    producer_outputs: BTreeMap<StepId, Turn>,
    reviewer_outputs: Vec<Turn>,
    approved: bool,
    approval: Option<ApprovalKind>,
    finished: bool,
    subject_facts: Vec<ExtractedFact>,
    organization_facts: Vec<ExtractedFact>,
    next_seq: u64,
}

impl RunState {
    /// Create a run state with the inbound message recorded as the first turn
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        inbound: ChatMessage,
    ) -> Self {
        let mut state = Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            inbound: inbound.clone(),
            profile: ProfileSnapshot::default(),
            history: Vec::new(),
            phase_prompt: None,
            turns: Vec::new(),
            producer_outputs: BTreeMap::new(),
            reviewer_outputs: Vec::new(),
            approved: false,
            approval: None,
            finished: false,
            subject_facts: Vec::new(),
            organization_facts: Vec::new(),
            next_seq: 0,
        };
        state.push_turn(StepOutput {
            step: StepId::Inbound,
            role: inbound.role,
            text: inbound.content,
            created_at: inbound.created_at,
        });
        state
    }

    pub fn with_profile(mut self, profile: ProfileSnapshot) -> Self {
        self.profile = profile;
        self
    }

    /// Prior session conversation, oldest first. The inbound message and
    /// non-conversational roles are filtered out.
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        let inbound_id = self.inbound.id.clone();
        self.history = history
            .into_iter()
            .filter(|m| m.id != inbound_id && m.role.is_conversational())
            .collect();
        self
    }

    pub fn with_phase_prompt(mut self, phase_prompt: Option<String>) -> Self {
        self.phase_prompt = phase_prompt.filter(|p| !p.trim().is_empty());
        self
    }

    fn push_turn(&mut self, output: StepOutput) -> &Turn {
        let turn = Turn {
            id: Uuid::new_v4(),
            seq: self.next_seq,
            step: output.step,
            role: output.role,
            text: output.text,
            created_at: output.created_at,
        };
        self.next_seq += 1;
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    /// Append a step's output to the turn log and to that step's bucket
    pub(crate) fn commit(&mut self, output: StepOutput) -> &Turn {
        let step = output.step;
        let turn = self.push_turn(output).clone();
        match step {
            StepId::Producer | StepId::Writer => {
                self.producer_outputs.insert(step, turn);
            }
            StepId::Reviewer => self.reviewer_outputs.push(turn),
            StepId::Inbound | StepId::Extractor => {}
        }
        &self.turns[self.turns.len() - 1]
    }

    /// Append extracted facts to their collections
    pub(crate) fn apply_extraction(&mut self, delta: ExtractionDelta) {
        for fact in delta.facts {
            match fact.category {
                FactCategory::Subject => self.subject_facts.push(fact),
                FactCategory::Organization => self.organization_facts.push(fact),
            }
        }
    }

    /// Raise the approval flag. The first approval wins.
    pub(crate) fn mark_approved(&mut self, kind: ApprovalKind) {
        if !self.approved {
            self.approved = true;
            self.approval = Some(kind);
        }
    }

    pub(crate) fn mark_finished(&mut self) {
        self.finished = true;
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn inbound(&self) -> &ChatMessage {
        &self.inbound
    }

    pub fn profile(&self) -> &ProfileSnapshot {
        &self.profile
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn phase_prompt(&self) -> Option<&str> {
        self.phase_prompt.as_deref()
    }

    /// Turns in insertion order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn producer_output(&self, step: StepId) -> Option<&Turn> {
        self.producer_outputs.get(&step)
    }

    pub fn producer_outputs(&self) -> impl Iterator<Item = (&StepId, &Turn)> {
        self.producer_outputs.iter()
    }

    /// Latest interview-context draft
    pub fn latest_draft(&self) -> Option<&Turn> {
        self.producer_output(StepId::Producer)
    }

    /// The user-facing message, once published
    pub fn published(&self) -> Option<&Turn> {
        self.producer_output(StepId::Writer)
    }

    pub fn reviewer_outputs(&self) -> &[Turn] {
        &self.reviewer_outputs
    }

    pub fn latest_review(&self) -> Option<&Turn> {
        self.reviewer_outputs.last()
    }

    pub fn approved(&self) -> bool {
        self.approved
    }

    pub fn approval(&self) -> Option<ApprovalKind> {
        self.approval
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn subject_facts(&self) -> &[ExtractedFact] {
        &self.subject_facts
    }

    pub fn organization_facts(&self) -> &[ExtractedFact] {
        &self.organization_facts
    }

    pub fn fact_count(&self) -> usize {
        self.subject_facts.len() + self.organization_facts.len()
    }

    /// Snapshot of what each field currently holds
    pub fn fingerprint(&self) -> StateFingerprint {
        StateFingerprint {
            turns: self.turns.len(),
            producer_outputs: self
                .producer_outputs
                .iter()
                .map(|(step, turn)| (*step, turn.id))
                .collect(),
            reviewer_outputs: self.reviewer_outputs.len(),
            approved: self.approved,
            finished: self.finished,
            extracted_facts: self.fact_count(),
        }
    }

    /// Persistence handoff for this run
    pub fn to_record(&self) -> RunRecord {
        RunRecord {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            message_id: self.inbound.id.clone(),
            turns: self
                .turns
                .iter()
                .filter(|t| t.step != StepId::Inbound)
                .cloned()
                .collect(),
            facts: self
                .subject_facts
                .iter()
                .chain(self.organization_facts.iter())
                .cloned()
                .collect(),
            finished: self.finished,
            approval: self.approval,
            reply: self.published().map(|t| t.text.clone()),
        }
    }
}

/// What a run state held at one instant, used to detect writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateFingerprint {
    turns: usize,
    producer_outputs: BTreeMap<StepId, Uuid>,
    reviewer_outputs: usize,
    approved: bool,
    finished: bool,
    extracted_facts: usize,
}

impl StateFingerprint {
    /// Fields whose content differs between `self` (before) and `after`
    pub fn touched(&self, after: &StateFingerprint) -> BTreeSet<StateField> {
        let mut fields = BTreeSet::new();
        if self.turns != after.turns {
            fields.insert(StateField::Turns);
        }
        if self.producer_outputs != after.producer_outputs {
            fields.insert(StateField::ProducerOutputs);
        }
        if self.reviewer_outputs != after.reviewer_outputs {
            fields.insert(StateField::ReviewerOutputs);
        }
        if self.approved != after.approved {
            fields.insert(StateField::Approved);
        }
        if self.finished != after.finished {
            fields.insert(StateField::Finished);
        }
        if self.extracted_facts != after.extracted_facts {
            fields.insert(StateField::ExtractedFacts);
        }
        fields
    }
}

/// Serializable summary of a finished run, handed to the session store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub session_id: String,
    pub user_id: String,
    pub message_id: String,
    /// Generated turns, inbound message excluded
    pub turns: Vec<Turn>,
    pub facts: Vec<ExtractedFact>,
    pub finished: bool,
    pub approval: Option<ApprovalKind>,
    pub reply: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colloquy::state::FactAttributes;

    fn state() -> RunState {
        RunState::new("s1", "u1", ChatMessage::new(Role::User, "We build robots."))
    }

    #[test]
    fn test_inbound_is_first_turn() {
        let state = state();
        assert_eq!(state.turns().len(), 1);
        assert_eq!(state.turns()[0].step, StepId::Inbound);
        assert_eq!(state.turns()[0].seq, 0);
        assert_eq!(state.turns()[0].text, "We build robots.");
        assert!(!state.approved());
        assert!(!state.finished());
    }

    #[test]
    fn test_commit_overwrites_producer_bucket_and_keeps_log() {
        let mut state = state();
        state.commit(StepOutput::new(StepId::Producer, Role::ContextBuilder, "draft 1"));
        state.commit(StepOutput::new(StepId::Reviewer, Role::Reviewer, "Verdict: REVISE"));
        state.commit(StepOutput::new(StepId::Producer, Role::ContextBuilder, "draft 2"));

        assert_eq!(state.latest_draft().unwrap().text, "draft 2");
        assert_eq!(state.reviewer_outputs().len(), 1);
        let drafts: Vec<&str> = state
            .turns()
            .iter()
            .filter(|t| t.step == StepId::Producer)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(drafts, vec!["draft 1", "draft 2"]);

        let seqs: Vec<u64> = state.turns().iter().map(|t| t.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_bucket_entries_are_in_turn_log() {
        let mut state = state();
        state.commit(StepOutput::new(StepId::Producer, Role::ContextBuilder, "draft"));
        state.commit(StepOutput::new(StepId::Reviewer, Role::Reviewer, "ok"));
        state.commit(StepOutput::new(StepId::Writer, Role::Writer, "Hello!"));

        for (step, turn) in state.producer_outputs() {
            assert!(state.turns().iter().any(|t| t == turn && t.step == *step));
        }
        for turn in state.reviewer_outputs() {
            assert!(state.turns().contains(turn));
        }
    }

    #[test]
    fn test_approval_is_monotonic() {
        let mut state = state();
        state.mark_approved(ApprovalKind::IterationCap);
        state.mark_approved(ApprovalKind::Reviewer);
        assert!(state.approved());
        assert_eq!(state.approval(), Some(ApprovalKind::IterationCap));
    }

    #[test]
    fn test_history_filters_inbound_and_internal_roles() {
        let inbound = ChatMessage::new(Role::User, "now");
        let history = vec![
            ChatMessage::new(Role::Writer, "Welcome"),
            ChatMessage::new(Role::System, "phase 1"),
            inbound.clone(),
        ];
        let state = RunState::new("s", "u", inbound).with_history(history);
        assert_eq!(state.history().len(), 1);
        assert_eq!(state.history()[0].content, "Welcome");
    }

    #[test]
    fn test_fingerprint_reports_touched_fields() {
        let mut state = state();
        let before = state.fingerprint();
        state.apply_extraction(ExtractionDelta {
            facts: vec![ExtractedFact::new(
                FactCategory::Organization,
                "40 employees",
                FactAttributes::default(),
            )],
        });
        let touched = before.touched(&state.fingerprint());
        assert_eq!(touched.into_iter().collect::<Vec<_>>(), vec![StateField::ExtractedFacts]);
        assert_eq!(state.organization_facts().len(), 1);
    }

    #[test]
    fn test_record_excludes_inbound_turn() {
        let mut state = state();
        state.commit(StepOutput::new(StepId::Writer, Role::Writer, "Tell me more."));
        state.mark_finished();

        let record = state.to_record();
        assert_eq!(record.turns.len(), 1);
        assert_eq!(record.reply.as_deref(), Some("Tell me more."));
        assert!(record.finished);
        assert_eq!(record.message_id, state.inbound().id);
    }
}
