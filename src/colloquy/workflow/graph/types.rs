// SPDX-License-Identifier: MIT

//! Workflow graph stages
//!
//! The stage graph is a straight line; the only cycle lives inside the
//! review loop and is bounded by its iteration cap.

use std::fmt;

/// One stage of the interview workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Extraction and context building, joined
    FanOut,
    /// Producer/reviewer loop until approval
    Review,
    /// Writer renders the user-facing message
    Publish,
    Terminal,
}

impl Stage {
    pub const ENTRY: Stage = Stage::FanOut;

    /// The stage that follows this one
    pub fn next(self) -> Stage {
        match self {
            Stage::FanOut => Stage::Review,
            Stage::Review => Stage::Publish,
            Stage::Publish | Stage::Terminal => Stage::Terminal,
        }
    }

    /// All stages in execution order
    pub fn path() -> Vec<Stage> {
        let mut stages = vec![Self::ENTRY];
        let mut current = Self::ENTRY;
        while current != Stage::Terminal {
            current = current.next();
            stages.push(current);
        }
        stages
    }

    /// Upper bound on generation calls for one run, per-fact parse calls
    /// excluded.
    pub fn max_agent_calls(max_iterations: u32) -> u32 {
        // the fan-out supplies the first draft, so revisions are one fewer
        // than reviews
        let loop_calls = max_iterations + max_iterations.saturating_sub(1);
        2 + loop_calls + 1
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::FanOut => "fan-out",
            Stage::Review => "review",
            Stage::Publish => "publish",
            Stage::Terminal => "terminal",
        };
        write!(f, "{}", s)
    }
}
