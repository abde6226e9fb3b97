// SPDX-License-Identifier: MIT

//! WorkflowRunner - drives one run state through the stage graph

use std::sync::Arc;

use thiserror::Error;

use super::types::Stage;
use crate::adk::agent::AgentPort;
use crate::adk::error::{ColloquyError, WorkflowError};
use crate::colloquy::state::{InboundMessage, Role, RunRecord, RunState, StepId, StepOutput};
use crate::colloquy::store::SessionStore;
use crate::colloquy::workflow::agent_factory::AgentFactory;
use crate::colloquy::workflow::context::ContextRenderer;
use crate::colloquy::workflow::extraction::ExtractionStep;
use crate::colloquy::workflow::fanout::FanOutJoin;
use crate::colloquy::workflow::review::{ReviewLoop, ReviewPhase};
use crate::colloquy::workflow::step::{StepExecutor, StepInput};
use crate::colloquy::workflow::types::{
    OrchestratorDefinition, PromptSet, ReviewSettings, SessionSettings,
};

/// The agent behind each step
#[derive(Clone)]
pub struct StepAgents {
    pub extractor: Arc<dyn AgentPort>,
    pub producer: Arc<dyn AgentPort>,
    pub reviewer: Arc<dyn AgentPort>,
    pub writer: Arc<dyn AgentPort>,
}

/// A run that stopped before the terminal stage
#[derive(Debug, Error)]
#[error("Run failed in stage {stage}: {error}")]
pub struct RunFailure {
    pub stage: Stage,
    #[source]
    pub error: ColloquyError,
    /// State as it was when the failure happened
    pub state: Box<RunState>,
}

/// Entry point for interview runs.
///
/// Holds no per-run data, so one runner can serve many concurrent runs.
#[derive(Clone)]
pub struct WorkflowRunner {
    fan_out: FanOutJoin,
    review: ReviewLoop,
    writer: StepExecutor,
    renderer: Arc<ContextRenderer>,
    session: SessionSettings,
}

impl WorkflowRunner {
    pub fn new(
        agents: StepAgents,
        prompts: PromptSet,
        review: ReviewSettings,
        session: SessionSettings,
    ) -> Result<Self, WorkflowError> {
        review.validate()?;
        let renderer = Arc::new(ContextRenderer::new(prompts, session.finish_marker.clone()));
        let producer = StepExecutor::new(StepId::Producer, Role::ContextBuilder, agents.producer);

        let fan_out = FanOutJoin::new(
            ExtractionStep::new(agents.extractor, renderer.clone()),
            producer.clone(),
            renderer.clone(),
        );
        let review = ReviewLoop::new(
            producer,
            StepExecutor::new(StepId::Reviewer, Role::Reviewer, agents.reviewer),
            renderer.clone(),
            review.max_iterations,
        )?;

        Ok(Self {
            fan_out,
            review,
            writer: StepExecutor::new(StepId::Writer, Role::Writer, agents.writer),
            renderer,
            session,
        })
    }

    /// Build a runner with agents created from the definition
    pub fn from_definition(def: &OrchestratorDefinition) -> Result<Self, ColloquyError> {
        def.validate()?;
        let factory = AgentFactory::new();
        let agents = StepAgents {
            extractor: factory.build(&def.agents.extractor)?,
            producer: factory.build(&def.agents.producer)?,
            reviewer: factory.build(&def.agents.reviewer)?,
            writer: factory.build(&def.agents.writer)?,
        };
        log::info!("Workflow '{}' ready", def.name);
        Ok(Self::new(
            agents,
            def.prompts.clone(),
            def.review.clone(),
            def.session.clone(),
        )?)
    }

    /// Build the initial run state for an inbound message
    pub async fn start(
        &self,
        store: &dyn SessionStore,
        user_id: &str,
        inbound: &InboundMessage,
    ) -> Result<RunState, ColloquyError> {
        let message = store
            .fetch_message(&inbound.session_id, &inbound.message_id)
            .await?
            .ok_or_else(|| ColloquyError::MessageNotFound(inbound.message_id.clone()))?;
        let profile = store.fetch_profile(user_id).await?;
        let history = store
            .fetch_history(&inbound.session_id, self.session.history_limit)
            .await?;
        let phase_prompt = store.fetch_phase_prompt(&inbound.session_id).await?;

        Ok(RunState::new(&inbound.session_id, user_id, message)
            .with_profile(profile)
            .with_history(history)
            .with_phase_prompt(phase_prompt))
    }

    /// Run the stage graph to the terminal stage
    pub async fn run(&self, mut state: RunState) -> Result<RunState, RunFailure> {
        let mut stage = Stage::ENTRY;
        while stage != Stage::Terminal {
            log::info!("Session {}: entering stage {}", state.session_id(), stage);
            let result = match stage {
                Stage::FanOut => self.fan_out.run(&mut state).await.into_result(),
                Stage::Review => self
                    .review
                    .run(&mut state, ReviewPhase::AwaitingVerdict)
                    .await
                    .map(|outcome| {
                        log::info!(
                            "Session {}: approved via {:?} after {} review(s)",
                            state.session_id(),
                            outcome.approval,
                            outcome.reviews
                        )
                    }),
                Stage::Publish => self.publish(&mut state).await,
                Stage::Terminal => Ok(()),
            };
            if let Err(error) = result {
                log::error!(
                    "Session {}: stage {} failed: {}",
                    state.session_id(),
                    stage,
                    error
                );
                return Err(RunFailure {
                    stage,
                    error,
                    state: Box::new(state),
                });
            }
            stage = stage.next();
        }
        Ok(state)
    }

    /// Start, run and persist one inbound message. Nothing is persisted
    /// when the run fails.
    pub async fn respond(
        &self,
        store: &dyn SessionStore,
        user_id: &str,
        inbound: &InboundMessage,
    ) -> Result<RunRecord, ColloquyError> {
        let state = self.start(store, user_id, inbound).await?;
        let state = self.run(state).await.map_err(|failure| failure.error)?;
        let record = state.to_record();
        store.persist_run(&record).await?;
        Ok(record)
    }

    async fn publish(&self, state: &mut RunState) -> Result<(), ColloquyError> {
        let publication = |e: ColloquyError| ColloquyError::Publication(Box::new(e));

        let prompt = self
            .renderer
            .writer_prompt(state)
            .map_err(|e| publication(e.into()))?;
        let output = self
            .writer
            .draft(&StepInput::new(prompt))
            .await
            .map_err(publication)?;

        let (text, finished) = strip_finish_marker(&output.text, self.renderer.finish_marker());
        if text.is_empty() {
            return Err(publication(ColloquyError::malformed(
                "writer reply was empty once the finish marker was removed",
            )));
        }
        state.commit(StepOutput { text, ..output });
        if finished {
            log::info!("Session {}: writer closed the session", state.session_id());
            state.mark_finished();
        }
        Ok(())
    }
}

/// Remove the finish marker from a reply, reporting whether it was present
pub fn strip_finish_marker(text: &str, marker: &str) -> (String, bool) {
    if marker.is_empty() || !text.contains(marker) {
        return (text.to_string(), false);
    }
    (text.replace(marker, "").trim().to_string(), true)
}
