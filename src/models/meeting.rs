use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::comment::Comment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseOrEvent {
    Course,
    Event,
}

impl CourseOrEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseOrEvent::Course => "course",
            CourseOrEvent::Event => "event",
        }
    }
}

impl fmt::Display for CourseOrEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourseOrEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "course" => Ok(CourseOrEvent::Course),
            "event" => Ok(CourseOrEvent::Event),
            other => Err(format!("unknown meeting kind '{other}'")),
        }
    }
}

/// The central record: a scheduled meeting or a schedule-less idea.
///
/// A `start_time` of `None` means the date has not been announced yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub mid: i64,
    pub title: String,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub course_or_event: Option<CourseOrEvent>,
    pub is_idea: bool,
    pub is_freetime: bool,
    pub username: String,
    pub creation_date: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub cost_center: Option<String>,
    pub number_of_allowed_externals: i32,
    pub tags: Vec<String>,
    pub deleted: bool,
    pub comments: Vec<Comment>,
    pub images: Vec<String>,
}

impl Meeting {
    /// Builds an unsaved meeting owned by `owner`. Tags, comments and
    /// images always start out empty.
    pub fn from_draft(owner: &str, draft: MeetingDraft, now: DateTime<Utc>) -> Self {
        Self {
            mid: 0,
            title: draft.title,
            short_description: draft.short_description,
            description: draft.description,
            course_or_event: draft.course_or_event,
            is_idea: draft.is_idea,
            is_freetime: draft.is_freetime,
            username: owner.to_string(),
            creation_date: now,
            start_time: draft.start_time,
            end_time: draft.end_time,
            location: draft.location,
            cost_center: draft.cost_center,
            number_of_allowed_externals: draft.number_of_allowed_externals,
            tags: Vec::new(),
            deleted: false,
            comments: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn is_owned_by(&self, username: &str) -> bool {
        self.username == username
    }

    /// Checks the field rules that hold for every persisted meeting.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if self.title.contains(|c| c == '\r' || c == '\n') {
            return Err("title must be a single line".to_string());
        }
        if self.number_of_allowed_externals < 0 {
            return Err("numberOfAllowedExternals must not be negative".to_string());
        }
        if !self.is_idea {
            if self.start_time.is_none() || self.end_time.is_none() {
                return Err("startTime and endTime are required for a meeting".to_string());
            }
            if self.location.as_deref().map_or(true, |l| l.trim().is_empty()) {
                return Err("location is required for a meeting".to_string());
            }
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if end < start {
                return Err("endTime must not be before startTime".to_string());
            }
        }
        Ok(())
    }
}

/// Payload for creating a meeting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingDraft {
    pub title: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub course_or_event: Option<CourseOrEvent>,
    #[serde(default)]
    pub is_idea: bool,
    #[serde(default)]
    pub is_freetime: bool,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub cost_center: Option<String>,
    #[serde(default)]
    pub number_of_allowed_externals: i32,
}

/// Partial update of a meeting.
///
/// The outer `Option` tells whether the field was sent at all; for nullable
/// columns the inner `Option` carries an explicit `null`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub short_description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub start_time: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "present")]
    pub end_time: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "present")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub cost_center: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub course_or_event: Option<Option<CourseOrEvent>>,
    #[serde(default)]
    pub is_idea: Option<bool>,
    #[serde(default)]
    pub is_freetime: Option<bool>,
    #[serde(default)]
    pub number_of_allowed_externals: Option<i32>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl MeetingPatch {
    pub fn changes_time(&self, meeting: &Meeting) -> bool {
        let start = self
            .start_time
            .as_ref()
            .is_some_and(|start| *start != meeting.start_time);
        let end = self
            .end_time
            .as_ref()
            .is_some_and(|end| *end != meeting.end_time);
        start || end
    }

    pub fn changes_location(&self, meeting: &Meeting) -> bool {
        self.location
            .as_ref()
            .is_some_and(|location| *location != meeting.location)
    }

    /// Copies every field that was sent onto `meeting`. Absent fields are
    /// left untouched, explicit `null`, `false` and `0` are applied.
    pub fn apply_to(self, meeting: &mut Meeting) {
        if let Some(title) = self.title {
            meeting.title = title;
        }
        if let Some(short_description) = self.short_description {
            meeting.short_description = short_description;
        }
        if let Some(description) = self.description {
            meeting.description = description;
        }
        if let Some(start_time) = self.start_time {
            meeting.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            meeting.end_time = end_time;
        }
        if let Some(location) = self.location {
            meeting.location = location;
        }
        if let Some(cost_center) = self.cost_center {
            meeting.cost_center = cost_center;
        }
        if let Some(course_or_event) = self.course_or_event {
            meeting.course_or_event = course_or_event;
        }
        if let Some(is_idea) = self.is_idea {
            meeting.is_idea = is_idea;
        }
        if let Some(is_freetime) = self.is_freetime {
            meeting.is_freetime = is_freetime;
        }
        if let Some(number_of_allowed_externals) = self.number_of_allowed_externals {
            meeting.number_of_allowed_externals = number_of_allowed_externals;
        }
        if let Some(mut tags) = self.tags {
            tags.sort();
            tags.dedup();
            meeting.tags = tags;
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, TimeZone};

    use super::*;

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    pub fn meeting(mid: i64, owner: &str) -> Meeting {
        Meeting {
            mid,
            title: format!("Meeting {mid}"),
            short_description: Some("short".to_string()),
            description: None,
            course_or_event: Some(CourseOrEvent::Course),
            is_idea: false,
            is_freetime: false,
            username: owner.to_string(),
            creation_date: now() - Duration::days(30),
            start_time: Some(now() + Duration::days(1)),
            end_time: Some(now() + Duration::days(1) + Duration::hours(2)),
            location: Some("Room 1".to_string()),
            cost_center: None,
            number_of_allowed_externals: 2,
            tags: Vec::new(),
            deleted: false,
            comments: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn idea(mid: i64, owner: &str) -> Meeting {
        Meeting {
            is_idea: true,
            start_time: None,
            end_time: None,
            location: None,
            ..meeting(mid, owner)
        }
    }
}
