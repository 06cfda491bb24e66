use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;

use crate::state::AppState;
use crate::utils::error::Result;
use crate::utils::response::success;

pub async fn list_tags(State(state): State<Arc<AppState>>) -> Result<Response> {
    Ok(success(state.meetings.tags().await?))
}
