use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::user::User;

/// Registration of one user for one meeting, unique per `(mid, username)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub mid: i64,
    pub username: String,
    pub externals: i32,
    pub took_part: bool,
    pub date_of_registration: DateTime<Utc>,
    pub date_of_confirmation: Option<DateTime<Utc>>,
}

impl Attendance {
    pub fn new(mid: i64, username: &str, externals: i32, now: DateTime<Utc>) -> Self {
        Self {
            mid,
            username: username.to_string(),
            externals,
            took_part: false,
            date_of_registration: now,
            date_of_confirmation: None,
        }
    }

    pub fn confirm(&mut self, now: DateTime<Utc>) {
        self.took_part = true;
        self.date_of_confirmation = Some(now);
    }
}

/// An attendance record together with the attendee's profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(flatten)]
    pub attendance: Attendance,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendRequest {
    #[serde(default)]
    pub externals: i32,
}
