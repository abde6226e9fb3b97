// SPDX-License-Identifier: MIT

//! Run state for interview workflows
//!
//! This module provides:
//! - `RunState` - the record every step of one run reads and appends to
//! - value types for turns, facts, profiles and session messages
//! - `RunRecord` - the persistence handoff built from a finished run

mod store;
mod types;

pub use store::{ExtractionDelta, RunRecord, RunState, StateFingerprint, StepOutput};
pub use types::{
    ApprovalKind, ChatMessage, ExtractedFact, FactAttributes, FactCategory, InboundMessage,
    ProfileSnapshot, Role, StateField, StepId, Turn,
};
