// SPDX-License-Identifier: MIT

//! Typed error handling for colloquy-rs
//!
//! `ColloquyError` is the error every workflow step surfaces. Backend faults
//! are described by `ModelError` and wrapped into `ColloquyError::Generation`
//! together with the name of the agent that failed.

use thiserror::Error;

/// Text returned to the end user when a run fails for a reason we do not
/// want to leak.
pub const FALLBACK_MESSAGE: &str = "An error occurred while processing your request.";

/// Text returned to the end user when the backend rejected the input on
/// content-policy grounds.
pub const CONTENT_FILTER_MESSAGE: &str = "Sorry, this prompt was filtered due to our content management policy. Please modify your input and try again.";

/// Top-level error type for colloquy-rs
#[derive(Debug, Error)]
pub enum ColloquyError {
    /// The generation call itself failed (transport, rate limit, policy rejection)
    #[error("Generation failed in agent '{agent}': {source}")]
    Generation {
        agent: String,
        #[source]
        source: ModelError,
    },

    /// Text came back but could not be parsed into the required record shape
    #[error("Malformed structured output: {0}")]
    MalformedOutput(String),

    /// One branch of the fan-out failed
    #[error("Fan-out branch '{branch}' failed: {source}")]
    PartialFanOut {
        branch: String,
        #[source]
        source: Box<ColloquyError>,
    },

    /// The final publication step failed
    #[error("Publication failed: {0}")]
    Publication(#[source] Box<ColloquyError>),

    /// Configuration errors (missing env vars, invalid config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workflow-specific errors
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Session store failures
    #[error("Session store error: {0}")]
    Store(String),

    /// The inbound message referenced by a request does not exist
    #[error("Message '{0}' not found")]
    MessageNotFound(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Workflow configuration and wiring errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The review loop needs at least one reviewer invocation
    #[error("Invalid review iteration cap: {0} (must be at least 1)")]
    InvalidIterationCap(u32),

    /// Model provider not known to the agent factory
    #[error("Unknown model provider: {0}")]
    UnknownProvider(String),

    /// The review loop was entered awaiting a verdict but no draft exists
    #[error("Review loop entered without a producer draft")]
    MissingDraft,
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The provider refused the request on content-policy grounds
    #[error("Content filtered by provider: {0}")]
    ContentFiltered(String),

    /// Request never produced an HTTP response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status from the provider
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl ColloquyError {
    /// Create a generation error for the named agent
    pub fn generation(agent: impl Into<String>, source: ModelError) -> Self {
        Self::Generation {
            agent: agent.into(),
            source,
        }
    }

    /// Create a malformed-output error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedOutput(message.into())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Whether the root cause is a content-policy rejection
    pub fn is_content_filtered(&self) -> bool {
        match self {
            Self::Generation {
                source: ModelError::ContentFiltered(_),
                ..
            } => true,
            Self::PartialFanOut { source, .. } | Self::Publication(source) => {
                source.is_content_filtered()
            }
            _ => false,
        }
    }

    /// Message safe to show to the end user. Never contains internal detail.
    pub fn user_message(&self) -> &'static str {
        if self.is_content_filtered() {
            CONTENT_FILTER_MESSAGE
        } else {
            FALLBACK_MESSAGE
        }
    }
}

impl From<&str> for ColloquyError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for ColloquyError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}
