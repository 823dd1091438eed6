use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use fysiocode_schema::{ConversationStatus, Turn};

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub conversation_id: String,
    pub status: ConversationStatus,
    pub turns: Vec<Turn>,
    pub last_active: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonResponse {
    pub conversation_id: String,
    pub status: ConversationStatus,
    pub previous: ConversationStatus,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(get_conversation))
        .route("/{id}/abandon", post(abandon_conversation))
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationView>, StatusCode> {
    let conv = state
        .resolver
        .store()
        .snapshot(&id)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;
    Ok(Json(ConversationView {
        conversation_id: conv.id,
        status: conv.status,
        turns: conv.turns,
        last_active: conv.last_active,
    }))
}

async fn abandon_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AbandonResponse>, StatusCode> {
    let previous = state
        .resolver
        .store()
        .abandon(&id)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;
    tracing::info!(conversation = %id, ?previous, "conversation abandoned");
    Ok(Json(AbandonResponse {
        conversation_id: id,
        status: ConversationStatus::Abandoned,
        previous,
    }))
}
