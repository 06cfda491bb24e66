use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;

use crate::models::AttendRequest;
use crate::services::export::{self, CSV_CONTENT_TYPE};
use crate::state::AppState;
use crate::utils::error::Result;
use crate::utils::extract::Actor;
use crate::utils::response::{attachment, success};

pub async fn list_attendees(
    State(state): State<Arc<AppState>>,
    Path(mid): Path<i64>,
) -> Result<Response> {
    Ok(success(state.meetings.attendees(mid).await?))
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Path(mid): Path<i64>,
) -> Result<Response> {
    Ok(success(state.meetings.bookings(mid).await?))
}

pub async fn export_attendees(
    State(state): State<Arc<AppState>>,
    Path(mid): Path<i64>,
    Actor(username): Actor,
) -> Result<Response> {
    let csv = state.attendance.export_csv(mid, &username).await?;
    Ok(attachment(CSV_CONTENT_TYPE, &export::filename(mid), csv))
}

/// The body is optional; without one no external guests are registered.
pub async fn attend(
    State(state): State<Arc<AppState>>,
    Path((mid, attendee)): Path<(i64, String)>,
    Actor(username): Actor,
    request: Option<Json<AttendRequest>>,
) -> Result<Response> {
    let externals = request.map(|Json(r)| r.externals).unwrap_or_default();
    let attendance = state
        .attendance
        .attend(mid, &attendee, &username, externals)
        .await?;
    Ok(success(attendance))
}

pub async fn leave(
    State(state): State<Arc<AppState>>,
    Path((mid, attendee)): Path<(i64, String)>,
    Actor(username): Actor,
) -> Result<Response> {
    Ok(success(state.attendance.leave(mid, &attendee, &username).await?))
}

pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Path((mid, attendee)): Path<(i64, String)>,
    Actor(username): Actor,
) -> Result<Response> {
    Ok(success(state.attendance.confirm(mid, &attendee, &username).await?))
}

pub async fn reject(
    State(state): State<Arc<AppState>>,
    Path((mid, attendee)): Path<(i64, String)>,
    Actor(username): Actor,
) -> Result<Response> {
    Ok(success(state.attendance.reject(mid, &attendee, &username).await?))
}
