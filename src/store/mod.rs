//! Persistence boundary for meetings, comments, attendance and users.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Attendance, Comment, Meeting, User};
use crate::services::filter::MeetingFilter;
use crate::utils::error::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait MeetingStore: Send + Sync {
    /// Persists a new meeting and returns it with its assigned `mid`.
    async fn insert_meeting(&self, meeting: &Meeting) -> Result<Meeting>;

    /// Loads a meeting with its comments. Soft-deleted meetings are only
    /// returned when `include_deleted` is set.
    async fn find_meeting(&self, mid: i64, include_deleted: bool) -> Result<Option<Meeting>>;

    async fn find_meetings(&self, filter: &MeetingFilter, now: DateTime<Utc>)
        -> Result<Vec<Meeting>>;

    /// Writes every scalar field, tags, images and the deleted flag.
    async fn save_meeting(&self, meeting: &Meeting) -> Result<Meeting>;

    async fn insert_comment(
        &self,
        mid: i64,
        author: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment>;

    /// Distinct tags of all non-deleted meetings, sorted.
    async fn distinct_tags(&self) -> Result<Vec<String>>;

    async fn attendances(&self, mid: i64) -> Result<Vec<Attendance>>;

    async fn find_attendance(&self, mid: i64, username: &str) -> Result<Option<Attendance>>;

    /// Registers `username` in one step. An existing registration only gets
    /// its `externals` updated. The flag is `true` when the row was inserted.
    async fn register_attendance(
        &self,
        mid: i64,
        username: &str,
        externals: i32,
        now: DateTime<Utc>,
    ) -> Result<(Attendance, bool)>;

    /// Inserts the record or replaces the existing one for `(mid, username)`.
    /// The registration date of an existing record is kept.
    async fn upsert_attendance(&self, attendance: &Attendance) -> Result<Attendance>;

    async fn delete_attendance(&self, mid: i64, username: &str) -> Result<Option<Attendance>>;

    async fn find_user(&self, username: &str) -> Result<Option<User>>;

    async fn find_users(&self, usernames: &[String]) -> Result<Vec<User>>;

    async fn all_users(&self) -> Result<Vec<User>>;
}
