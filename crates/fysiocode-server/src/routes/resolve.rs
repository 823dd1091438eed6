use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;

use fysiocode_schema::{ErrorKind, Query, ResolutionResult};

use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarifyRequest {
    pub conversation_id: String,
    pub answer_text: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/resolve", post(resolve))
        .route("/clarify", post(clarify))
}

/// Input that never entered the pipeline is the caller's fault; everything
/// else is a 200 with the outcome in the body.
fn status_for(result: &ResolutionResult) -> StatusCode {
    match &result.error {
        Some(err) if err.kind == ErrorKind::Validation => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    }
}

async fn resolve(
    State(state): State<AppState>,
    Json(query): Json<Query>,
) -> (StatusCode, Json<ResolutionResult>) {
    let result = state.resolver.resolve(&query).await;
    (status_for(&result), Json(result))
}

async fn clarify(
    State(state): State<AppState>,
    Json(request): Json<ClarifyRequest>,
) -> (StatusCode, Json<ResolutionResult>) {
    let result = state
        .resolver
        .resolve_clarification(&request.conversation_id, &request.answer_text)
        .await;
    (status_for(&result), Json(result))
}
