// SPDX-License-Identifier: MIT

//! Stage graph and the runner that executes it

pub mod executor;
pub mod types;

pub use executor::{strip_finish_marker, RunFailure, StepAgents, WorkflowRunner};
pub use types::Stage;
