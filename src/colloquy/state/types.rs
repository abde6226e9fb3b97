// SPDX-License-Identifier: MIT

//! Value types shared by the run state, the workflow steps and the store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a workflow step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepId {
    /// The received user message, recorded before any step runs
    Inbound,
    Extractor,
    Producer,
    Reviewer,
    Writer,
}

impl StepId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::Inbound => "inbound",
            StepId::Extractor => "extractor",
            StepId::Producer => "producer",
            StepId::Reviewer => "reviewer",
            StepId::Writer => "writer",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role tag carried by session messages and turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "writer")]
    Writer,
    #[serde(rename = "system")]
    System,
    /// The producer that builds the interview context
    #[serde(rename = "meta-agent")]
    ContextBuilder,
    #[serde(rename = "reviewer")]
    Reviewer,
    #[serde(rename = "extractor")]
    Extractor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Writer => "writer",
            Role::System => "system",
            Role::ContextBuilder => "meta-agent",
            Role::Reviewer => "reviewer",
            Role::Extractor => "extractor",
        }
    }

    /// Whether messages with this role belong to the visible conversation
    pub fn is_conversational(&self) -> bool {
        matches!(self, Role::User | Role::Writer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message stored in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// One timestamped, role-tagged unit of text in the run's log.
///
/// `seq` is the insertion sequence within the run and the only reliable
/// chronological key; `created_at` is informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub seq: u64,
    pub step: StepId,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Which collection an extracted fact belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactCategory {
    /// About the interviewee
    Subject,
    /// About the interviewee's organization
    Organization,
}

impl FactCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactCategory::Subject => "subject",
            FactCategory::Organization => "organization",
        }
    }
}

/// Structured attributes parsed from an extracted fact.
///
/// Every field is optional; `FactAttributes::default()` is the empty record
/// used when parsing fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactAttributes {
    #[serde(default, alias = "description", skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
    #[serde(default)]
    pub themes: Vec<String>,
}

impl FactAttributes {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Numeric fields must lie in [0, 1]
    pub fn out_of_range_field(&self) -> Option<&'static str> {
        let bad = |v: Option<f64>| v.is_some_and(|x| !(0.0..=1.0).contains(&x));
        if bad(self.score) {
            Some("score")
        } else if bad(self.relevance) {
            Some("relevance")
        } else {
            None
        }
    }
}

/// An immutable fact mined from the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFact {
    pub id: Uuid,
    pub category: FactCategory,
    pub raw_text: String,
    pub attributes: FactAttributes,
    pub created_at: DateTime<Utc>,
}

impl ExtractedFact {
    pub fn new(
        category: FactCategory,
        raw_text: impl Into<String>,
        attributes: FactAttributes,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            raw_text: raw_text.into(),
            attributes,
            created_at: Utc::now(),
        }
    }
}

/// Read-only profile data captured when a run starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub user_description: String,
    pub organization_description: String,
    pub distilled_subject_facts: String,
    pub distilled_organization_facts: String,
}

impl Default for ProfileSnapshot {
    fn default() -> Self {
        Self {
            user_description: "Unknown".to_string(),
            organization_description: "Unknown".to_string(),
            distilled_subject_facts: "none".to_string(),
            distilled_organization_facts: "none".to_string(),
        }
    }
}

/// How the review loop reached approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    /// The reviewer's verdict approved the draft
    Reviewer,
    /// The iteration cap forced approval
    IterationCap,
}

/// Fields of the run state, used to report which ones an operation wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    Turns,
    ProducerOutputs,
    ReviewerOutputs,
    Approved,
    Finished,
    ExtractedFacts,
}

/// Inbound trigger: a session and the message that was just received
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub session_id: String,
    pub message_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_serde_names() {
        assert_eq!(serde_json::to_value(Role::ContextBuilder).unwrap(), json!("meta-agent"));
        let role: Role = serde_json::from_value(json!("writer")).unwrap();
        assert_eq!(role, Role::Writer);
        assert!(role.is_conversational());
        assert!(!Role::Reviewer.is_conversational());
    }

    #[test]
    fn test_fact_attributes_description_alias() {
        let attrs: FactAttributes = serde_json::from_value(json!({
            "description": "Team size",
            "score": 0.4,
            "themes": ["growth"]
        }))
        .unwrap();
        assert_eq!(attrs.topic.as_deref(), Some("Team size"));
        assert_eq!(attrs.relevance, None);
        assert!(!attrs.is_empty());
        assert!(FactAttributes::default().is_empty());
    }

    #[test]
    fn test_fact_attributes_range() {
        let attrs = FactAttributes {
            relevance: Some(1.5),
            ..Default::default()
        };
        assert_eq!(attrs.out_of_range_field(), Some("relevance"));

        let ok = FactAttributes {
            score: Some(0.0),
            relevance: Some(1.0),
            ..Default::default()
        };
        assert_eq!(ok.out_of_range_field(), None);
    }

    #[test]
    fn test_profile_defaults() {
        let profile = ProfileSnapshot::default();
        assert_eq!(profile.user_description, "Unknown");
        assert_eq!(profile.distilled_organization_facts, "none");
    }
}
