use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatPayload {
    pub message: String,
    pub user_id: i64,
    pub session_id: Option<String>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatPayload>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let session_id = match payload.session_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => state.history.create_session(payload.user_id).await?,
    };

    let reply = state
        .pipeline
        .answer(&payload.message, payload.user_id, &session_id)
        .await?;

    Ok(Json(json!({
        "reply": reply,
        "session_id": session_id
    })))
}
