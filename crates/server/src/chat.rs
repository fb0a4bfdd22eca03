use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use mabar_agent::Coordinator;
use mabar_core::{CurrentUser, SessionCard};

#[derive(Clone)]
pub struct ChatState {
    coordinator: Arc<Coordinator>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
    /// Authenticated caller context, attached upstream by the auth layer.
    #[serde(default)]
    pub user: Option<CurrentUser>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnResponse {
    pub session_id: String,
    pub text: String,
    pub session_cards: Vec<SessionCard>,
    pub needs_more_info: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatError {
    pub error: String,
}

pub fn router(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route("/chat", post(chat_turn))
        .route("/chat/{session_id}", delete(reset_session))
        .with_state(ChatState { coordinator })
}

pub async fn chat_turn(
    State(state): State<ChatState>,
    Json(request): Json<ChatTurnRequest>,
) -> Result<Json<ChatTurnResponse>, (StatusCode, Json<ChatError>)> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ChatError { error: "message must not be empty".to_string() }),
        ));
    }

    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    info!(
        event_name = "ingress.chat.turn_received",
        session_id = %session_id,
        correlation_id = %session_id,
        authenticated = request.user.is_some(),
        "received chat turn"
    );

    let reply = state
        .coordinator
        .handle_turn(&session_id, message, request.user.as_ref())
        .await;

    Ok(Json(ChatTurnResponse {
        session_id,
        text: reply.text,
        session_cards: reply.session_cards,
        needs_more_info: reply.needs_more_info,
    }))
}

pub async fn reset_session(
    State(state): State<ChatState>,
    Path(session_id): Path<String>,
) -> StatusCode {
    info!(
        event_name = "ingress.chat.reset_received",
        session_id = %session_id,
        correlation_id = %session_id,
        "received session reset"
    );
    state.coordinator.reset_conversation(&session_id).await;
    StatusCode::NO_CONTENT
}
