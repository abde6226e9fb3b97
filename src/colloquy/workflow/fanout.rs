// SPDX-License-Identifier: MIT

//! FanOutJoin - extraction and context building side by side
//!
//! Both branches are spawned against one snapshot of the run state and the
//! join waits for both, whatever either returns. Their outputs are applied
//! in completion order. The extraction branch only ever writes
//! `extracted_facts`; the context branch writes the producer draft and its
//! turn. Those sets must stay disjoint.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinHandle;

use crate::adk::error::ColloquyError;
use crate::colloquy::state::{ExtractionDelta, RunState, StateField, StepOutput};
use crate::colloquy::workflow::context::ContextRenderer;
use crate::colloquy::workflow::extraction::ExtractionStep;
use crate::colloquy::workflow::step::{StepExecutor, StepInput};

/// The two branches of the fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Branch {
    Extraction,
    Context,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Extraction => f.write_str("extraction"),
            Branch::Context => f.write_str("context"),
        }
    }
}

enum BranchResult {
    Extraction(Result<ExtractionDelta, ColloquyError>),
    Context(Result<StepOutput, ColloquyError>),
}

/// What happened in one fan-out
#[derive(Debug, Default)]
pub struct FanOutReport {
    /// Branches in the order they finished
    pub completion_order: Vec<Branch>,
    pub extraction_error: Option<ColloquyError>,
    pub context_error: Option<ColloquyError>,
    /// State fields each branch changed when its result was applied
    pub writes: BTreeMap<Branch, BTreeSet<StateField>>,
}

impl FanOutReport {
    pub fn is_complete_success(&self) -> bool {
        self.extraction_error.is_none() && self.context_error.is_none()
    }

    /// Fields written by more than one branch
    pub fn overlapping_writes(&self) -> BTreeSet<StateField> {
        let empty = BTreeSet::new();
        let extraction = self.writes.get(&Branch::Extraction).unwrap_or(&empty);
        let context = self.writes.get(&Branch::Context).unwrap_or(&empty);
        extraction.intersection(context).copied().collect()
    }

    /// Continue only if the context branch succeeded; extraction failures
    /// are logged and dropped.
    pub fn into_result(self) -> Result<(), ColloquyError> {
        if let Some(e) = self.extraction_error {
            log::warn!("Extraction branch failed, continuing without new facts: {}", e);
        }
        match self.context_error {
            Some(e) => Err(ColloquyError::PartialFanOut {
                branch: Branch::Context.to_string(),
                source: Box::new(e),
            }),
            None => Ok(()),
        }
    }
}

/// Runs extraction and context building concurrently and joins them
#[derive(Clone)]
pub struct FanOutJoin {
    extraction: ExtractionStep,
    context: StepExecutor,
    renderer: Arc<ContextRenderer>,
}

impl FanOutJoin {
    pub fn new(
        extraction: ExtractionStep,
        context: StepExecutor,
        renderer: Arc<ContextRenderer>,
    ) -> Self {
        Self {
            extraction,
            context,
            renderer,
        }
    }

    pub async fn run(&self, state: &mut RunState) -> FanOutReport {
        let extraction = self.extraction.clone();
        let context = self.context.clone();
        let renderer = self.renderer.clone();

        join_branches(
            state,
            move |snapshot: Arc<RunState>| async move { extraction.run(&snapshot).await },
            move |snapshot: Arc<RunState>| async move {
                let input = StepInput::new(renderer.producer_prompt(&snapshot))
                    .with_prior_turns(renderer.prior_turns(&snapshot));
                context.draft(&input).await
            },
        )
        .await
    }
}

/// Spawn both branches over one snapshot of `state`, then apply their
/// results to `state` in completion order.
async fn join_branches<E, EF, C, CF>(
    state: &mut RunState,
    extraction: E,
    context: C,
) -> FanOutReport
where
    E: FnOnce(Arc<RunState>) -> EF,
    EF: Future<Output = Result<ExtractionDelta, ColloquyError>> + Send + 'static,
    C: FnOnce(Arc<RunState>) -> CF,
    CF: Future<Output = Result<StepOutput, ColloquyError>> + Send + 'static,
{
    let snapshot = Arc::new(state.clone());

    let mut handles: FuturesUnordered<JoinHandle<BranchResult>> = FuturesUnordered::new();
    let extraction = extraction(snapshot.clone());
    handles.push(tokio::spawn(async move {
        BranchResult::Extraction(extraction.await)
    }));
    let context = context(snapshot);
    handles.push(tokio::spawn(async move {
        BranchResult::Context(context.await)
    }));

    let mut report = FanOutReport::default();
    while let Some(joined) = handles.next().await {
        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                // the missing branch is identified below
                log::error!("Fan-out branch task failed: {}", e);
                continue;
            }
        };
        let before = state.fingerprint();
        let branch = match result {
            BranchResult::Extraction(Ok(delta)) => {
                log::info!("Extraction branch produced {} fact(s)", delta.facts.len());
                state.apply_extraction(delta);
                Branch::Extraction
            }
            BranchResult::Extraction(Err(e)) => {
                report.extraction_error = Some(e);
                Branch::Extraction
            }
            BranchResult::Context(Ok(output)) => {
                state.commit(output);
                Branch::Context
            }
            BranchResult::Context(Err(e)) => {
                report.context_error = Some(e);
                Branch::Context
            }
        };
        report.completion_order.push(branch);
        report
            .writes
            .insert(branch, before.touched(&state.fingerprint()));
    }

    for branch in [Branch::Extraction, Branch::Context] {
        if !report.completion_order.contains(&branch) {
            let err = ColloquyError::other(format!("{} branch did not complete", branch));
            match branch {
                Branch::Extraction => report.extraction_error = Some(err),
                Branch::Context => report.context_error = Some(err),
            }
        }
    }

    debug_assert!(
        report.overlapping_writes().is_empty(),
        "fan-out branches wrote the same fields"
    );
    report
}
