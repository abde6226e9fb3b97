// SPDX-License-Identifier: MIT

//! Orchestrator loader - YAML file loading and parsing

use super::types::OrchestratorDefinition;
use crate::adk::error::ColloquyError;
use std::fs;
use std::path::Path;

/// Loads orchestrator definitions from YAML files
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load and validate an orchestrator definition from a YAML file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<OrchestratorDefinition, ColloquyError> {
        let path = path.as_ref();
        log::info!("Loading orchestrator definition from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse and validate an orchestrator definition from a YAML string
    pub fn parse_yaml(content: &str) -> Result<OrchestratorDefinition, ColloquyError> {
        let def: OrchestratorDefinition = serde_yaml::from_str(content)?;
        def.validate()?;
        Ok(def)
    }
}

impl Default for WorkflowLoader {
    fn default() -> Self {
        Self::new()
    }
}
