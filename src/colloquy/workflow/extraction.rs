// SPDX-License-Identifier: MIT

//! Extraction step - best-effort fact mining from the latest exchange
//!
//! One call labels the segments of the exchange that say something about
//! the user or the organization; each segment then gets one structured
//! parse call. Parse problems never drop a fact: the segment is kept with
//! an empty attribute record.

use std::sync::Arc;

use serde_json::Value;

use crate::adk::agent::AgentPort;
use crate::adk::error::ColloquyError;
use crate::colloquy::state::{
    ExtractedFact, ExtractionDelta, FactAttributes, FactCategory, RunState,
};
use crate::colloquy::workflow::context::ContextRenderer;

/// Runs extraction against a run state snapshot and returns the facts found
#[derive(Clone)]
pub struct ExtractionStep {
    agent: Arc<dyn AgentPort>,
    renderer: Arc<ContextRenderer>,
}

impl ExtractionStep {
    pub fn new(agent: Arc<dyn AgentPort>, renderer: Arc<ContextRenderer>) -> Self {
        Self { agent, renderer }
    }

    /// Fails only when the labelling call itself fails
    pub async fn run(&self, state: &RunState) -> Result<ExtractionDelta, ColloquyError> {
        let prompt = self.renderer.extraction_prompt(state);
        let labelled = self.agent.generate(&prompt, &[]).await?;
        let segments = parse_segments(&labelled);
        log::info!("Extraction found {} segment(s)", segments.len());

        let mut facts = Vec::with_capacity(segments.len());
        for (category, segment) in segments {
            let attributes = self.parse_segment(category, &segment).await;
            facts.push(ExtractedFact::new(category, segment, attributes));
        }
        Ok(ExtractionDelta { facts })
    }

    async fn parse_segment(&self, category: FactCategory, segment: &str) -> FactAttributes {
        let prompt = self.renderer.parse_prompt(category, segment);
        match self.agent.generate(&prompt, &[]).await {
            Ok(reply) => structured_or_empty(&reply),
            Err(e) => {
                log::warn!(
                    "Structured parse call failed for {} segment, keeping empty record: {}",
                    category.as_str(),
                    e
                );
                FactAttributes::default()
            }
        }
    }
}

/// Split labelled extraction output into categorized segments.
///
/// Lines look like `[Company AIR Info] text`; the label's first word picks
/// the category. Unlabelled or unknown lines are ignored.
pub fn parse_segments(text: &str) -> Vec<(FactCategory, String)> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            let rest = line.strip_prefix('[')?;
            let close = rest.find(']')?;
            let label = rest[..close].trim().to_lowercase();
            let segment = rest[close + 1..].trim();
            if segment.is_empty() {
                return None;
            }
            let category = match label.split_whitespace().next()? {
                "company" | "organization" | "organisation" => FactCategory::Organization,
                "user" => FactCategory::Subject,
                _ => return None,
            };
            Some((category, segment.to_string()))
        })
        .collect()
}

/// Parse a structured record, tolerating markdown fences and surrounding prose
pub fn parse_attributes(text: &str) -> Result<FactAttributes, ColloquyError> {
    let value = extract_json(text)?;
    if !value.is_object() {
        return Err(ColloquyError::malformed(format!(
            "expected a JSON object, got {}",
            value
        )));
    }
    let attributes: FactAttributes = serde_json::from_value(value)
        .map_err(|e| ColloquyError::malformed(format!("unexpected record shape: {}", e)))?;
    if let Some(field) = attributes.out_of_range_field() {
        return Err(ColloquyError::malformed(format!(
            "'{}' must be between 0 and 1",
            field
        )));
    }
    Ok(attributes)
}

/// Like [`parse_attributes`], recovering malformed output as an empty record
pub fn structured_or_empty(text: &str) -> FactAttributes {
    parse_attributes(text).unwrap_or_else(|e| {
        log::warn!("Dropping structured attributes: {}", e);
        FactAttributes::default()
    })
}

fn extract_json(text: &str) -> Result<Value, ColloquyError> {
    let stripped = strip_fences(text.trim());
    if let Ok(value) = serde_json::from_str(stripped) {
        return Ok(value);
    }
    match (stripped.find('{'), stripped.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&stripped[start..=end])
            .map_err(|e| ColloquyError::malformed(format!("invalid JSON: {}", e))),
        _ => Err(ColloquyError::malformed("no JSON object found")),
    }
}

fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim().strip_suffix("```").unwrap_or(rest).trim()
}
