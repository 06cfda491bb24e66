use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use crate::calendar;
use crate::models::{MeetingDraft, MeetingPatch, NewComment};
use crate::services::MeetingsQuery;
use crate::state::AppState;
use crate::utils::error::Result;
use crate::utils::extract::Actor;
use crate::utils::response::{attachment, success};

#[derive(Debug, Deserialize)]
pub struct ImageUpload {
    pub data: String,
}

pub async fn list_meetings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MeetingsQuery>,
) -> Result<Response> {
    let meetings = state.meetings.find_all(&query.into()).await?;
    Ok(success(meetings))
}

pub async fn get_meeting(
    State(state): State<Arc<AppState>>,
    Path(mid): Path<i64>,
) -> Result<Response> {
    Ok(success(state.meetings.find_one(mid).await?))
}

pub async fn get_calendar(
    State(state): State<Arc<AppState>>,
    Path(mid): Path<i64>,
) -> Result<Response> {
    let entry = state.meetings.calendar(mid).await?;
    Ok(attachment(calendar::CONTENT_TYPE, &entry.filename, entry.content))
}

pub async fn create_meeting(
    State(state): State<Arc<AppState>>,
    Actor(username): Actor,
    Json(draft): Json<MeetingDraft>,
) -> Result<Response> {
    Ok(success(state.meetings.create(&username, draft).await?))
}

pub async fn update_meeting(
    State(state): State<Arc<AppState>>,
    Path(mid): Path<i64>,
    Actor(username): Actor,
    Json(patch): Json<MeetingPatch>,
) -> Result<Response> {
    Ok(success(state.meetings.update(mid, &username, patch).await?))
}

pub async fn delete_meeting(
    State(state): State<Arc<AppState>>,
    Path(mid): Path<i64>,
    Actor(username): Actor,
) -> Result<Response> {
    Ok(success(state.meetings.delete(mid, &username).await?))
}

pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    Path(mid): Path<i64>,
    Actor(username): Actor,
    Json(comment): Json<NewComment>,
) -> Result<Response> {
    let meeting = state
        .meetings
        .add_comment(mid, &username, &comment.text)
        .await?;
    Ok(success(meeting))
}

pub async fn attach_image(
    State(state): State<Arc<AppState>>,
    Path(mid): Path<i64>,
    Actor(username): Actor,
    Json(upload): Json<ImageUpload>,
) -> Result<Response> {
    let meeting = state
        .meetings
        .attach_image(mid, &username, &upload.data)
        .await?;
    Ok(success(meeting))
}
