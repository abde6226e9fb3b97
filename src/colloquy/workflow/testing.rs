// SPDX-License-Identifier: MIT

//! Scripted AgentPort double shared by the workflow tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::adk::agent::{AgentPort, PriorTurn};
use crate::adk::error::{ColloquyError, ModelError};

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Fail,
    Filtered,
}

/// Agent that plays back queued replies, then repeats a fallback
pub(crate) struct ScriptedAgent {
    name: String,
    script: Mutex<VecDeque<Scripted>>,
    fallback: Option<Scripted>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    prior_turn_counts: Mutex<Vec<usize>>,
}

impl ScriptedAgent {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            prior_turn_counts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn reply(self, text: &str) -> Self {
        self.push(Scripted::Reply(text.to_string()))
    }

    pub(crate) fn fail(self) -> Self {
        self.push(Scripted::Fail)
    }

    pub(crate) fn filtered(self) -> Self {
        self.push(Scripted::Filtered)
    }

    /// Reply with `text` once the queue is empty
    pub(crate) fn always(mut self, text: &str) -> Self {
        self.fallback = Some(Scripted::Reply(text.to_string()));
        self
    }

    /// Fail every call once the queue is empty
    pub(crate) fn always_fail(mut self) -> Self {
        self.fallback = Some(Scripted::Fail);
        self
    }

    pub(crate) fn with_delay(mut self, millis: u64) -> Self {
        self.delay = Some(Duration::from_millis(millis));
        self
    }

    fn push(self, item: Scripted) -> Self {
        self.script.lock().unwrap().push_back(item);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub(crate) fn prior_turn_counts(&self) -> Vec<usize> {
        self.prior_turn_counts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentPort for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        prompt: &str,
        prior_turns: &[PriorTurn],
    ) -> Result<String, ColloquyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.prior_turn_counts.lock().unwrap().push(prior_turns.len());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        match next.or_else(|| self.fallback.clone()) {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Fail) => Err(ColloquyError::generation(
                &self.name,
                ModelError::RateLimited {
                    retry_after_secs: None,
                },
            )),
            Some(Scripted::Filtered) => Err(ColloquyError::generation(
                &self.name,
                ModelError::ContentFiltered("policy".to_string()),
            )),
            None => Err(ColloquyError::generation(
                &self.name,
                ModelError::InvalidResponse("script exhausted".to_string()),
            )),
        }
    }
}
