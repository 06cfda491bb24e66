use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::MeetingStore;
use crate::models::{Attendance, Comment, Meeting, User};
use crate::services::filter::MeetingFilter;
use crate::utils::error::{AppError, Result};

#[derive(Default)]
struct Inner {
    meetings: BTreeMap<i64, Meeting>,
    attendances: BTreeMap<(i64, String), Attendance>,
    users: BTreeMap<String, User>,
    last_mid: i64,
    last_comment_id: i64,
}

/// Store kept entirely in process memory. Ordering follows `mid`.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_user(&self, user: User) {
        let mut inner = self.inner.write().await;
        inner.users.insert(user.username.clone(), user);
    }
}

#[async_trait]
impl MeetingStore for MemoryStore {
    async fn insert_meeting(&self, meeting: &Meeting) -> Result<Meeting> {
        let mut inner = self.inner.write().await;
        inner.last_mid += 1;

        let mut stored = meeting.clone();
        stored.mid = inner.last_mid;
        inner.meetings.insert(stored.mid, stored.clone());
        Ok(stored)
    }

    async fn find_meeting(&self, mid: i64, include_deleted: bool) -> Result<Option<Meeting>> {
        let inner = self.inner.read().await;
        Ok(inner
            .meetings
            .get(&mid)
            .filter(|m| include_deleted || !m.deleted)
            .cloned())
    }

    async fn find_meetings(
        &self,
        filter: &MeetingFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Meeting>> {
        let inner = self.inner.read().await;
        Ok(inner
            .meetings
            .values()
            .filter(|m| filter.matches(m, now))
            .cloned()
            .collect())
    }

    async fn save_meeting(&self, meeting: &Meeting) -> Result<Meeting> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .meetings
            .get_mut(&meeting.mid)
            .ok_or_else(|| AppError::meeting_not_found(meeting.mid))?;

        // Comments are only ever appended through `insert_comment`.
        let comments = std::mem::take(&mut stored.comments);
        *stored = Meeting {
            comments,
            ..meeting.clone()
        };
        Ok(stored.clone())
    }

    async fn insert_comment(
        &self,
        mid: i64,
        author: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment> {
        let mut inner = self.inner.write().await;
        inner.last_comment_id += 1;
        let comment = Comment {
            id: inner.last_comment_id,
            mid,
            author: author.to_string(),
            text: text.to_string(),
            creation_date: now,
        };

        inner
            .meetings
            .get_mut(&mid)
            .ok_or_else(|| AppError::meeting_not_found(mid))?
            .comments
            .push(comment.clone());
        Ok(comment)
    }

    async fn distinct_tags(&self) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        let tags: BTreeSet<&String> = inner
            .meetings
            .values()
            .filter(|m| !m.deleted)
            .flat_map(|m| m.tags.iter())
            .collect();
        Ok(tags.into_iter().cloned().collect())
    }

    async fn attendances(&self, mid: i64) -> Result<Vec<Attendance>> {
        let inner = self.inner.read().await;
        let mut records: Vec<Attendance> = inner
            .attendances
            .values()
            .filter(|a| a.mid == mid)
            .cloned()
            .collect();
        records.sort_by_key(|a| a.date_of_registration);
        Ok(records)
    }

    async fn find_attendance(&self, mid: i64, username: &str) -> Result<Option<Attendance>> {
        let inner = self.inner.read().await;
        Ok(inner.attendances.get(&(mid, username.to_string())).cloned())
    }

    async fn register_attendance(
        &self,
        mid: i64,
        username: &str,
        externals: i32,
        now: DateTime<Utc>,
    ) -> Result<(Attendance, bool)> {
        let mut inner = self.inner.write().await;
        match inner.attendances.entry((mid, username.to_string())) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().externals = externals;
                Ok((entry.get().clone(), false))
            }
            Entry::Vacant(entry) => {
                let record = entry.insert(Attendance::new(mid, username, externals, now));
                Ok((record.clone(), true))
            }
        }
    }

    async fn upsert_attendance(&self, attendance: &Attendance) -> Result<Attendance> {
        let mut inner = self.inner.write().await;
        let key = (attendance.mid, attendance.username.clone());
        let mut record = attendance.clone();
        if let Some(existing) = inner.attendances.get(&key) {
            record.date_of_registration = existing.date_of_registration;
        }
        inner.attendances.insert(key, record.clone());
        Ok(record)
    }

    async fn delete_attendance(&self, mid: i64, username: &str) -> Result<Option<Attendance>> {
        let mut inner = self.inner.write().await;
        Ok(inner.attendances.remove(&(mid, username.to_string())))
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(username).cloned())
    }

    async fn find_users(&self, usernames: &[String]) -> Result<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(usernames
            .iter()
            .filter_map(|name| inner.users.get(name).cloned())
            .collect())
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().cloned().collect())
    }
}
