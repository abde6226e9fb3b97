// SPDX-License-Identifier: MIT

//! Agent development kit: errors, model backends and the agent port

pub mod agent;
pub mod error;
pub mod model;
