// SPDX-License-Identifier: MIT

//! Interview orchestration: run state, workflow, session store and HTTP surface

pub mod server;
pub mod state;
pub mod store;
pub mod workflow;
