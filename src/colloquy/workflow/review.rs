// SPDX-License-Identifier: MIT

//! ReviewLoop - bounded producer/reviewer cycle
//!
//! ```text
//! Drafting -> AwaitingVerdict -> Approved
//!                  |
//!                  +-> Revising -> Drafting
//! ```
//!
//! The cap counts reviewer invocations. When it is reached without an
//! approving verdict the loop approves anyway and records
//! `ApprovalKind::IterationCap`.

use std::fmt;
use std::sync::Arc;

use crate::adk::error::{ColloquyError, WorkflowError};
use crate::colloquy::state::{ApprovalKind, RunState};
use crate::colloquy::workflow::context::ContextRenderer;
use crate::colloquy::workflow::step::{StepExecutor, StepInput};

/// Reviewer decision read from free text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approve,
    Revise,
    /// No decision could be read; treated as non-approving
    Unrecognized,
}

const KEYWORDS: [(&str, Verdict); 6] = [
    ("not approved", Verdict::Revise),
    ("unapproved", Verdict::Revise),
    ("disapprove", Verdict::Revise),
    ("revise", Verdict::Revise),
    ("reject", Verdict::Revise),
    ("approve", Verdict::Approve),
];

impl Verdict {
    /// Read a verdict from reviewer output.
    ///
    /// The last line mentioning "verdict" decides when present. Otherwise the
    /// whole text is searched. Either way the earliest keyword wins, so
    /// "APPROVE - nothing left to revise" approves and "not approved" revises.
    pub fn parse(text: &str) -> Self {
        let lower = text.to_lowercase();
        let verdict_line = lower
            .lines()
            .rev()
            .find_map(|line| line.find("verdict").map(|idx| &line[idx + "verdict".len()..]));

        match verdict_line {
            Some(line) => match Self::scan(line) {
                Verdict::Unrecognized => Self::scan(&lower),
                verdict => verdict,
            },
            None => Self::scan(&lower),
        }
    }

    fn scan(lower: &str) -> Self {
        KEYWORDS
            .iter()
            .filter_map(|(keyword, verdict)| lower.find(keyword).map(|idx| (idx, *verdict)))
            .min_by_key(|(idx, _)| *idx)
            .map_or(Verdict::Unrecognized, |(_, verdict)| verdict)
    }

    pub fn is_approving(&self) -> bool {
        matches!(self, Verdict::Approve)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Approve => "APPROVE",
            Verdict::Revise => "REVISE",
            Verdict::Unrecognized => "UNRECOGNIZED",
        };
        write!(f, "{}", s)
    }
}

/// States of the review loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewPhase {
    Drafting,
    AwaitingVerdict,
    Revising,
    Approved(ApprovalKind),
}

/// Summary of one loop execution
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub reviews: u32,
    pub drafts: u32,
    pub approval: ApprovalKind,
    /// Every phase visited, entry phase first
    pub transitions: Vec<ReviewPhase>,
}

/// Bounded critique/revise loop between a producer and a reviewer
#[derive(Clone)]
pub struct ReviewLoop {
    producer: StepExecutor,
    reviewer: StepExecutor,
    renderer: Arc<ContextRenderer>,
    max_iterations: u32,
}

impl ReviewLoop {
    pub fn new(
        producer: StepExecutor,
        reviewer: StepExecutor,
        renderer: Arc<ContextRenderer>,
        max_iterations: u32,
    ) -> Result<Self, WorkflowError> {
        if max_iterations == 0 {
            return Err(WorkflowError::InvalidIterationCap(max_iterations));
        }
        Ok(Self {
            producer,
            reviewer,
            renderer,
            max_iterations,
        })
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Drive the loop from `entry` until it reaches `Approved`.
    ///
    /// Entering at `AwaitingVerdict` requires a producer draft in `state`.
    /// Generation failures propagate and leave `approved` untouched.
    pub async fn run(
        &self,
        state: &mut RunState,
        entry: ReviewPhase,
    ) -> Result<ReviewOutcome, ColloquyError> {
        if entry == ReviewPhase::AwaitingVerdict && state.latest_draft().is_none() {
            return Err(WorkflowError::MissingDraft.into());
        }

        let mut phase = entry;
        let mut reviews = 0u32;
        let mut drafts = 0u32;
        let mut transitions = vec![phase];

        let approval = loop {
            phase = match phase {
                ReviewPhase::Drafting => {
                    let input = StepInput::new(self.renderer.producer_prompt(state))
                        .with_prior_turns(self.renderer.prior_turns(state));
                    self.producer.execute(state, &input).await?;
                    drafts += 1;
                    ReviewPhase::AwaitingVerdict
                }
                ReviewPhase::AwaitingVerdict => {
                    let input = StepInput::new(self.renderer.reviewer_prompt(state));
                    let verdict = Verdict::parse(&self.reviewer.execute(state, &input).await?.text);
                    reviews += 1;
                    log::info!(
                        "Review {}/{} verdict: {}",
                        reviews,
                        self.max_iterations,
                        verdict
                    );

                    if verdict.is_approving() {
                        ReviewPhase::Approved(ApprovalKind::Reviewer)
                    } else if reviews >= self.max_iterations {
                        log::warn!(
                            "Review iteration cap reached ({}), forcing approval",
                            self.max_iterations
                        );
                        ReviewPhase::Approved(ApprovalKind::IterationCap)
                    } else {
                        ReviewPhase::Revising
                    }
                }
                ReviewPhase::Revising => ReviewPhase::Drafting,
                ReviewPhase::Approved(kind) => break kind,
            };
            transitions.push(phase);
        };

        state.mark_approved(approval);
        Ok(ReviewOutcome {
            reviews,
            drafts,
            approval,
            transitions,
        })
    }
}
