use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use serde::Serialize;

use crate::api::{cookie_header, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    pub thread_id: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /thread (learner's thread, created on first use)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_thread(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ThreadResponse>, ApiError> {
    let raw = cookie_header(&headers, &state.config.identity.header_name);
    let identity = state.decoder.decode(raw)?;
    let thread_id = state
        .resolver
        .resolve(&identity, &state.assistant_id, None)
        .await?;
    Ok(Json(ThreadResponse { thread_id }))
}
