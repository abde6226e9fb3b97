// SPDX-License-Identifier: MIT

pub mod agent_factory;
pub mod context;
pub mod extraction;
pub mod fanout;
pub mod graph;
pub mod loader;
pub mod review;
pub mod step;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
