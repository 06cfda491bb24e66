use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::{FromRow, Postgres, QueryBuilder};

use super::MeetingStore;
use crate::models::{Attendance, Comment, CourseOrEvent, Meeting, User};
use crate::services::filter::{MeetingFilter, TimeFilter, TimeWindow};
use crate::utils::error::{AppError, Result};

const MEETING_COLUMNS: &str = "mid, title, short_description, description, course_or_event, \
     is_idea, is_freetime, username, creation_date, start_time, end_time, location, \
     cost_center, number_of_allowed_externals, tags, deleted, images";

/// Insert-or-update in one statement. `xmax` is 0 only for a row created by
/// this statement; an existing row keeps its registration date.
const REGISTER_ATTENDANCE: &str = "INSERT INTO meeting_users (mid, username, externals, \
     took_part, date_of_registration) VALUES ($1, $2, $3, false, $4) \
     ON CONFLICT (mid, username) DO UPDATE SET externals = EXCLUDED.externals \
     RETURNING mid, username, externals, took_part, date_of_registration, \
     date_of_confirmation, (xmax = 0) AS inserted";

#[derive(Debug, FromRow)]
struct RegistrationRow {
    #[sqlx(flatten)]
    attendance: Attendance,
    inserted: bool,
}

#[derive(Debug, FromRow)]
struct MeetingRow {
    mid: i64,
    title: String,
    short_description: Option<String>,
    description: Option<String>,
    course_or_event: Option<String>,
    is_idea: bool,
    is_freetime: bool,
    username: String,
    creation_date: DateTime<Utc>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    location: Option<String>,
    cost_center: Option<String>,
    number_of_allowed_externals: i32,
    tags: Vec<String>,
    deleted: bool,
    images: Vec<String>,
}

impl MeetingRow {
    fn into_meeting(self, comments: Vec<Comment>) -> Result<Meeting> {
        let course_or_event = self
            .course_or_event
            .as_deref()
            .map(str::parse::<CourseOrEvent>)
            .transpose()
            .map_err(AppError::InternalServerError)?;

        Ok(Meeting {
            mid: self.mid,
            title: self.title,
            short_description: self.short_description,
            description: self.description,
            course_or_event,
            is_idea: self.is_idea,
            is_freetime: self.is_freetime,
            username: self.username,
            creation_date: self.creation_date,
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location,
            cost_center: self.cost_center,
            number_of_allowed_externals: self.number_of_allowed_externals,
            tags: self.tags,
            deleted: self.deleted,
            comments,
            images: self.images,
        })
    }
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn comments_for(&self, mids: &[i64]) -> Result<HashMap<i64, Vec<Comment>>> {
        if mids.is_empty() {
            return Ok(HashMap::new());
        }

        let comments: Vec<Comment> = sqlx::query_as(
            "SELECT id, mid, author, text, creation_date FROM comments \
             WHERE mid = ANY($1) ORDER BY creation_date, id",
        )
        .bind(mids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_meeting: HashMap<i64, Vec<Comment>> = HashMap::new();
        for comment in comments {
            by_meeting.entry(comment.mid).or_default().push(comment);
        }
        Ok(by_meeting)
    }

    async fn with_comments(&self, rows: Vec<MeetingRow>) -> Result<Vec<Meeting>> {
        let mids: Vec<i64> = rows.iter().map(|r| r.mid).collect();
        let mut comments = self.comments_for(&mids).await?;

        rows.into_iter()
            .map(|row| {
                let own = comments.remove(&row.mid).unwrap_or_default();
                row.into_meeting(own)
            })
            .collect()
    }
}

/// Appends the WHERE clause for `filter` to a `SELECT ... FROM meetings`.
fn push_filter<'a>(
    qb: &mut QueryBuilder<'a, Postgres>,
    filter: &'a MeetingFilter,
    now: DateTime<Utc>,
) {
    qb.push(" WHERE deleted = false AND is_idea = ");
    qb.push_bind(filter.idea);

    if let Some(kind) = filter.course_or_event {
        qb.push(" AND course_or_event = ");
        qb.push_bind(kind.as_str());
    }
    if let Some(owner) = &filter.username {
        qb.push(" AND username = ");
        qb.push_bind(owner);
    }
    if !filter.tags.is_empty() {
        qb.push(" AND tags @> ");
        qb.push_bind(&filter.tags);
    }

    if let TimeFilter::Windows(windows) = &filter.time {
        qb.push(" AND (");
        for (i, window) in windows.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            match window {
                TimeWindow::Upcoming => {
                    qb.push("start_time >= ");
                    qb.push_bind(now);
                }
                TimeWindow::Past => {
                    qb.push("start_time < ");
                    qb.push_bind(now);
                }
                TimeWindow::NotAnnounced => {
                    qb.push("start_time IS NULL");
                }
            }
        }
        qb.push(")");
    }
}

#[async_trait]
impl MeetingStore for PgStore {
    async fn insert_meeting(&self, meeting: &Meeting) -> Result<Meeting> {
        let row: MeetingRow = sqlx::query_as(&format!(
            "INSERT INTO meetings (title, short_description, description, course_or_event, \
             is_idea, is_freetime, username, creation_date, start_time, end_time, location, \
             cost_center, number_of_allowed_externals, tags, deleted, images) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {MEETING_COLUMNS}"
        ))
        .bind(&meeting.title)
        .bind(&meeting.short_description)
        .bind(&meeting.description)
        .bind(meeting.course_or_event.map(|k| k.as_str()))
        .bind(meeting.is_idea)
        .bind(meeting.is_freetime)
        .bind(&meeting.username)
        .bind(meeting.creation_date)
        .bind(meeting.start_time)
        .bind(meeting.end_time)
        .bind(&meeting.location)
        .bind(&meeting.cost_center)
        .bind(meeting.number_of_allowed_externals)
        .bind(&meeting.tags)
        .bind(meeting.deleted)
        .bind(&meeting.images)
        .fetch_one(&self.pool)
        .await?;

        row.into_meeting(Vec::new())
    }

    async fn find_meeting(&self, mid: i64, include_deleted: bool) -> Result<Option<Meeting>> {
        let row: Option<MeetingRow> = sqlx::query_as(&format!(
            "SELECT {MEETING_COLUMNS} FROM meetings WHERE mid = $1 AND ($2 OR deleted = false)"
        ))
        .bind(mid)
        .bind(include_deleted)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.with_comments(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_meetings(
        &self,
        filter: &MeetingFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Meeting>> {
        let mut qb = QueryBuilder::new(format!("SELECT {MEETING_COLUMNS} FROM meetings"));
        push_filter(&mut qb, filter, now);
        qb.push(" ORDER BY mid");

        let rows: Vec<MeetingRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        self.with_comments(rows).await
    }

    async fn save_meeting(&self, meeting: &Meeting) -> Result<Meeting> {
        let row: Option<MeetingRow> = sqlx::query_as(&format!(
            "UPDATE meetings SET title = $2, short_description = $3, description = $4, \
             course_or_event = $5, is_idea = $6, is_freetime = $7, start_time = $8, \
             end_time = $9, location = $10, cost_center = $11, \
             number_of_allowed_externals = $12, tags = $13, deleted = $14, images = $15 \
             WHERE mid = $1 RETURNING {MEETING_COLUMNS}"
        ))
        .bind(meeting.mid)
        .bind(&meeting.title)
        .bind(&meeting.short_description)
        .bind(&meeting.description)
        .bind(meeting.course_or_event.map(|k| k.as_str()))
        .bind(meeting.is_idea)
        .bind(meeting.is_freetime)
        .bind(meeting.start_time)
        .bind(meeting.end_time)
        .bind(&meeting.location)
        .bind(&meeting.cost_center)
        .bind(meeting.number_of_allowed_externals)
        .bind(&meeting.tags)
        .bind(meeting.deleted)
        .bind(&meeting.images)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| AppError::meeting_not_found(meeting.mid))?;
        let mut saved = self.with_comments(vec![row]).await?;
        saved
            .pop()
            .ok_or_else(|| AppError::meeting_not_found(meeting.mid))
    }

    async fn insert_comment(
        &self,
        mid: i64,
        author: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment> {
        let comment: Comment = sqlx::query_as(
            "INSERT INTO comments (mid, author, text, creation_date) VALUES ($1, $2, $3, $4) \
             RETURNING id, mid, author, text, creation_date",
        )
        .bind(mid)
        .bind(author)
        .bind(text)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn distinct_tags(&self) -> Result<Vec<String>> {
        let tags: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT UNNEST(tags) AS tag FROM meetings \
             WHERE deleted = false AND tags <> '{}' ORDER BY tag",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tags)
    }

    async fn attendances(&self, mid: i64) -> Result<Vec<Attendance>> {
        let records: Vec<Attendance> = sqlx::query_as(
            "SELECT mid, username, externals, took_part, date_of_registration, \
             date_of_confirmation FROM meeting_users WHERE mid = $1 \
             ORDER BY date_of_registration",
        )
        .bind(mid)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn find_attendance(&self, mid: i64, username: &str) -> Result<Option<Attendance>> {
        let record: Option<Attendance> = sqlx::query_as(
            "SELECT mid, username, externals, took_part, date_of_registration, \
             date_of_confirmation FROM meeting_users WHERE mid = $1 AND username = $2",
        )
        .bind(mid)
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn register_attendance(
        &self,
        mid: i64,
        username: &str,
        externals: i32,
        now: DateTime<Utc>,
    ) -> Result<(Attendance, bool)> {
        let row: RegistrationRow = sqlx::query_as(REGISTER_ATTENDANCE)
            .bind(mid)
            .bind(username)
            .bind(externals)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok((row.attendance, row.inserted))
    }

    async fn upsert_attendance(&self, attendance: &Attendance) -> Result<Attendance> {
        let record: Attendance = sqlx::query_as(
            "INSERT INTO meeting_users (mid, username, externals, took_part, \
             date_of_registration, date_of_confirmation) VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (mid, username) DO UPDATE SET externals = EXCLUDED.externals, \
             took_part = EXCLUDED.took_part, \
             date_of_confirmation = EXCLUDED.date_of_confirmation \
             RETURNING mid, username, externals, took_part, date_of_registration, \
             date_of_confirmation",
        )
        .bind(attendance.mid)
        .bind(&attendance.username)
        .bind(attendance.externals)
        .bind(attendance.took_part)
        .bind(attendance.date_of_registration)
        .bind(attendance.date_of_confirmation)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete_attendance(&self, mid: i64, username: &str) -> Result<Option<Attendance>> {
        let record: Option<Attendance> = sqlx::query_as(
            "DELETE FROM meeting_users WHERE mid = $1 AND username = $2 \
             RETURNING mid, username, externals, took_part, date_of_registration, \
             date_of_confirmation",
        )
        .bind(mid)
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>> {
        let user: Option<User> = sqlx::query_as(
            "SELECT username, firstname, lastname, email FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_users(&self, usernames: &[String]) -> Result<Vec<User>> {
        let users: Vec<User> = sqlx::query_as(
            "SELECT username, firstname, lastname, email FROM users WHERE username = ANY($1)",
        )
        .bind(usernames)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        let users: Vec<User> =
            sqlx::query_as("SELECT username, firstname, lastname, email FROM users ORDER BY username")
                .fetch_all(&self.pool)
                .await?;

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::filter::MeetingsQuery;

    fn sql_for(query: MeetingsQuery) -> String {
        let filter = MeetingFilter::from(query);
        let mut qb = QueryBuilder::new("SELECT mid FROM meetings");
        push_filter(&mut qb, &filter, Utc::now());
        qb.sql().to_string()
    }

    #[test]
    fn test_registration_only_updates_externals_on_conflict() {
        let (_, on_conflict) = REGISTER_ATTENDANCE.split_once("ON CONFLICT").unwrap();
        let (update, returning) = on_conflict.split_once("RETURNING").unwrap();

        assert!(update.contains("externals = EXCLUDED.externals"));
        assert!(!update.contains("date_of_registration"));
        assert!(returning.contains("(xmax = 0) AS inserted"));
    }

    #[test]
    fn test_unrestricted_filter_has_no_time_clause() {
        let sql = sql_for(MeetingsQuery {
            show_new: true,
            show_old: true,
            show_not_announced: true,
            ..Default::default()
        });

        assert_eq!(
            sql,
            "SELECT mid FROM meetings WHERE deleted = false AND is_idea = $1"
        );
    }

    #[test]
    fn test_time_windows_become_an_or_group() {
        let sql = sql_for(MeetingsQuery {
            show_old: true,
            show_not_announced: true,
            username: Some("alice".into()),
            tags: vec!["rust".into()],
            ..Default::default()
        });

        assert_eq!(
            sql,
            "SELECT mid FROM meetings WHERE deleted = false AND is_idea = $1 \
             AND username = $2 AND tags @> $3 AND (start_time < $4 OR start_time IS NULL)"
        );
    }
}
