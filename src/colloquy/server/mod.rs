// SPDX-License-Identifier: MIT

//! HTTP trigger for interview runs

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::adk::error::ColloquyError;
use crate::colloquy::state::{InboundMessage, Role};
use crate::colloquy::store::InMemorySessionStore;
use crate::colloquy::workflow::graph::WorkflowRunner;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<WorkflowRunner>,
    pub store: InMemorySessionStore,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub user_id: String,
    pub session_id: String,
    pub message_id: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SendMessageResponse {
    pub error: bool,
    pub response: String,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub user_id: String,
    pub content: String,
}

impl AppState {
    pub fn new(runner: WorkflowRunner, store: InMemorySessionStore) -> Self {
        Self {
            runner: Arc::new(runner),
            store,
        }
    }

    /// Run the workflow for one stored message. Failures become the generic
    /// fallback text; nothing is persisted for them.
    pub async fn handle_send(&self, req: SendMessageRequest) -> SendMessageResponse {
        let inbound = InboundMessage {
            session_id: req.session_id.clone(),
            message_id: req.message_id,
        };
        match self.runner.respond(&self.store, &req.user_id, &inbound).await {
            Ok(record) => SendMessageResponse {
                error: false,
                response: record.reply.unwrap_or_default(),
                session_id: req.session_id,
            },
            Err(e) => {
                log::error!("Run failed for session {}: {}", req.session_id, e);
                SendMessageResponse {
                    error: true,
                    response: e.user_message().to_string(),
                    session_id: req.session_id,
                }
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/chat/send_message", post(send_message))
        .route("/chat/sessions/{session_id}/messages", post(post_message))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> Result<(), ColloquyError> {
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn send_message(
    State(state): State<AppState>,
    Json(payload): Json<SendMessageRequest>,
) -> Json<SendMessageResponse> {
    Json(state.handle_send(payload).await)
}

async fn post_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<PostMessageRequest>,
) -> Json<Value> {
    let message = state
        .store
        .append_message(&session_id, Role::User, payload.content)
        .await;
    log::debug!("User {} posted message {}", payload.user_id, message.id);
    Json(json!({ "session_id": session_id, "message_id": message.id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::{CONTENT_FILTER_MESSAGE, FALLBACK_MESSAGE};
    use crate::colloquy::workflow::graph::StepAgents;
    use crate::colloquy::workflow::testing::ScriptedAgent;
    use crate::colloquy::workflow::types::{PromptSet, ReviewSettings, SessionSettings};

    fn app(writer: ScriptedAgent) -> AppState {
        let runner = WorkflowRunner::new(
            StepAgents {
                extractor: Arc::new(ScriptedAgent::new("UpdateAgent").always("nothing")),
                producer: Arc::new(ScriptedAgent::new("MetaAgent").always("context")),
                reviewer: Arc::new(ScriptedAgent::new("Reviewer").always("approved")),
                writer: Arc::new(writer),
            },
            PromptSet::default(),
            ReviewSettings::default(),
            SessionSettings::default(),
        )
        .unwrap();
        AppState::new(runner, InMemorySessionStore::new())
    }

    #[tokio::test]
    async fn test_send_message_success() {
        let state = app(ScriptedAgent::new("Writer").always("What is your role?"));
        let msg = state.store.append_message("s1", Role::User, "Hi").await;

        let resp = state
            .handle_send(SendMessageRequest {
                user_id: "u1".to_string(),
                session_id: "s1".to_string(),
                message_id: msg.id,
            })
            .await;
        assert_eq!(
            resp,
            SendMessageResponse {
                error: false,
                response: "What is your role?".to_string(),
                session_id: "s1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_send_message_failure_is_generic() {
        let state = app(ScriptedAgent::new("Writer").always_fail());
        let msg = state.store.append_message("s1", Role::User, "Hi").await;

        let resp = state
            .handle_send(SendMessageRequest {
                user_id: "u1".to_string(),
                session_id: "s1".to_string(),
                message_id: msg.id,
            })
            .await;
        assert!(resp.error);
        assert_eq!(resp.response, FALLBACK_MESSAGE);
        assert!(!state.store.is_finished("s1").await);
        assert_eq!(state.store.messages("s1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_send_message_content_filter() {
        let state = app(ScriptedAgent::new("Writer").filtered());
        let msg = state.store.append_message("s1", Role::User, "Hi").await;

        let resp = state
            .handle_send(SendMessageRequest {
                user_id: "u1".to_string(),
                session_id: "s1".to_string(),
                message_id: msg.id,
            })
            .await;
        assert_eq!(resp.response, CONTENT_FILTER_MESSAGE);
    }

    #[tokio::test]
    async fn test_unknown_message_is_generic_error() {
        let state = app(ScriptedAgent::new("Writer").always("x"));
        let resp = state
            .handle_send(SendMessageRequest {
                user_id: "u1".to_string(),
                session_id: "s1".to_string(),
                message_id: "missing".to_string(),
            })
            .await;
        assert!(resp.error);
        assert_eq!(resp.response, FALLBACK_MESSAGE);
    }

    #[tokio::test]
    async fn test_router_builds() {
        let _router = router(app(ScriptedAgent::new("Writer")));
    }
}
