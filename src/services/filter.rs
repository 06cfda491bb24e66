//! Translation of the listing filter into a meeting predicate.
//!
//! The user-facing flags are first normalised into a [`MeetingFilter`], whose
//! [`TimeFilter`] is either unrestricted or a non-empty set of time windows.
//! The in-memory store evaluates [`MeetingFilter::matches`] directly, the
//! Postgres store compiles the same structure into SQL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::models::{CourseOrEvent, Meeting};

/// Listing flags as sent by the web client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingsQuery {
    #[serde(default)]
    pub show_not_announced: bool,
    #[serde(default)]
    pub show_old: bool,
    #[serde(default)]
    pub show_new: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub course_or_event: Option<CourseOrEvent>,
    #[serde(default)]
    pub idea: bool,
    #[serde(default, deserialize_with = "comma_separated")]
    pub tags: Vec<String>,
}

fn comma_separated<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// `startTime >= now`
    Upcoming,
    /// `startTime < now`
    Past,
    /// `startTime IS NULL`
    NotAnnounced,
}

impl TimeWindow {
    pub fn contains(&self, start_time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match (self, start_time) {
            (TimeWindow::Upcoming, Some(start)) => start >= now,
            (TimeWindow::Past, Some(start)) => start < now,
            (TimeWindow::NotAnnounced, None) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeFilter {
    Unrestricted,
    /// A meeting passes if it falls into at least one window. Never empty.
    Windows(Vec<TimeWindow>),
}

impl TimeFilter {
    pub fn from_flags(show_new: bool, show_old: bool, show_not_announced: bool) -> Self {
        let mut windows = Vec::with_capacity(3);
        if show_new {
            windows.push(TimeWindow::Upcoming);
        }
        if show_old {
            windows.push(TimeWindow::Past);
        }
        if show_not_announced {
            windows.push(TimeWindow::NotAnnounced);
        }

        // All three windows together cover every meeting; none selected
        // imposes no constraint either.
        if windows.is_empty() || windows.len() == 3 {
            TimeFilter::Unrestricted
        } else {
            TimeFilter::Windows(windows)
        }
    }

    pub fn admits(&self, start_time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match self {
            TimeFilter::Unrestricted => true,
            TimeFilter::Windows(windows) => windows.iter().any(|w| w.contains(start_time, now)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingFilter {
    pub course_or_event: Option<CourseOrEvent>,
    pub idea: bool,
    pub username: Option<String>,
    pub tags: Vec<String>,
    pub time: TimeFilter,
}

impl From<MeetingsQuery> for MeetingFilter {
    fn from(query: MeetingsQuery) -> Self {
        Self {
            course_or_event: query.course_or_event,
            idea: query.idea,
            username: query.username.filter(|u| !u.is_empty()),
            tags: query.tags,
            time: TimeFilter::from_flags(query.show_new, query.show_old, query.show_not_announced),
        }
    }
}

impl MeetingFilter {
    /// Conditions that hold regardless of the time dimension.
    pub fn matches_base(&self, meeting: &Meeting) -> bool {
        if meeting.deleted || meeting.is_idea != self.idea {
            return false;
        }
        if let Some(kind) = self.course_or_event {
            if meeting.course_or_event != Some(kind) {
                return false;
            }
        }
        if let Some(owner) = &self.username {
            if &meeting.username != owner {
                return false;
            }
        }
        self.tags.iter().all(|tag| meeting.tags.contains(tag))
    }

    pub fn matches(&self, meeting: &Meeting, now: DateTime<Utc>) -> bool {
        self.matches_base(meeting) && self.time.admits(meeting.start_time, now)
    }
}
