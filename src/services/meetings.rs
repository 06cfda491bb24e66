use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::bookings;
use super::filter::MeetingFilter;
use crate::calendar::{calendar_for, CalendarAttachment, CalendarSettings};
use crate::images::ImageStore;
use crate::models::{Attendance, Booking, Meeting, MeetingDraft, MeetingPatch};
use crate::notifications::render::schedule_text;
use crate::notifications::{Notification, NotificationKind, Outbox, Recipients};
use crate::store::MeetingStore;
use crate::utils::error::{AppError, Result};

/// Create, update, delete and comment on meetings. Every change is
/// persisted first; notifications go to the outbox afterwards.
pub struct MeetingService {
    store: Arc<dyn MeetingStore>,
    outbox: Arc<dyn Outbox>,
    images: Arc<dyn ImageStore>,
    calendar: CalendarSettings,
}

impl MeetingService {
    pub fn new(
        store: Arc<dyn MeetingStore>,
        outbox: Arc<dyn Outbox>,
        images: Arc<dyn ImageStore>,
        calendar: CalendarSettings,
    ) -> Self {
        Self {
            store,
            outbox,
            images,
            calendar,
        }
    }

    pub async fn find_all(&self, filter: &MeetingFilter) -> Result<Vec<Meeting>> {
        self.store.find_meetings(filter, Utc::now()).await
    }

    pub async fn find_one(&self, mid: i64) -> Result<Meeting> {
        self.store
            .find_meeting(mid, false)
            .await?
            .ok_or_else(|| AppError::meeting_not_found(mid))
    }

    async fn find_owned(&self, mid: i64, actor: &str) -> Result<Meeting> {
        let meeting = self.find_one(mid).await?;
        if !meeting.is_owned_by(actor) {
            return Err(AppError::Forbidden(format!(
                "Only the organizer may change meeting {mid}"
            )));
        }
        Ok(meeting)
    }

    pub async fn create(&self, owner: &str, draft: MeetingDraft) -> Result<Meeting> {
        let meeting = Meeting::from_draft(owner, draft, Utc::now());
        meeting.validate().map_err(AppError::ValidationError)?;

        let saved = self.store.insert_meeting(&meeting).await?;
        info!(meeting_id = saved.mid, username = owner, is_idea = saved.is_idea, "Meeting created");

        self.outbox.enqueue(
            Notification::new(NotificationKind::NewMeeting, saved.clone(), Recipients::AllUsers)
                .actor(owner),
        );
        Ok(saved)
    }

    /// Applies `patch` and informs attendees when the time or the location
    /// changed. Deleted meetings cannot be updated.
    pub async fn update(&self, mid: i64, actor: &str, patch: MeetingPatch) -> Result<Meeting> {
        let mut meeting = self.find_owned(mid, actor).await?;

        let time_changed = patch.changes_time(&meeting);
        let location_changed = patch.changes_location(&meeting);

        patch.apply_to(&mut meeting);
        meeting.validate().map_err(AppError::ValidationError)?;
        let saved = self.store.save_meeting(&meeting).await?;
        info!(meeting_id = mid, time_changed, location_changed, "Meeting updated");

        if time_changed || location_changed {
            let recipients = Recipients::attendees(&self.store.attendances(mid).await?);

            if time_changed {
                self.outbox.enqueue(
                    Notification::new(NotificationKind::TimeChanged, saved.clone(), recipients.clone())
                        .actor(&saved.username)
                        .text(schedule_text(&saved))
                        .calendar(calendar_for(&saved, &self.calendar, Utc::now())),
                );
            }
            if location_changed {
                self.outbox.enqueue(
                    Notification::new(NotificationKind::LocationChanged, saved.clone(), recipients)
                        .actor(&saved.username),
                );
            }
        }

        Ok(saved)
    }

    /// Soft delete. The meeting stays in storage but disappears from every
    /// lookup; current attendees get a cancellation.
    pub async fn delete(&self, mid: i64, actor: &str) -> Result<Meeting> {
        let mut meeting = self.find_owned(mid, actor).await?;
        meeting.deleted = true;

        let attendees = self.store.attendances(mid).await?;
        let saved = self.store.save_meeting(&meeting).await?;
        info!(meeting_id = mid, attendees = attendees.len(), "Meeting deleted");

        self.outbox.enqueue(
            Notification::new(
                NotificationKind::DeletedMeeting,
                saved.clone(),
                Recipients::attendees(&attendees),
            )
            .actor(&saved.username)
            .calendar(calendar_for(&saved, &self.calendar, Utc::now())),
        );
        Ok(saved)
    }

    pub async fn add_comment(&self, mid: i64, author: &str, text: &str) -> Result<Meeting> {
        let mut meeting = self.find_one(mid).await?;
        if text.trim().is_empty() {
            return Err(AppError::ValidationError("Comment must not be empty".to_string()));
        }

        let comment = self.store.insert_comment(mid, author, text, Utc::now()).await?;
        meeting.comments.push(comment);

        let attendees = self.store.attendances(mid).await?;
        self.outbox.enqueue(
            Notification::new(
                NotificationKind::NewComment,
                meeting.clone(),
                Recipients::attendees(&attendees),
            )
            .actor(author)
            .text(text),
        );
        Ok(meeting)
    }

    pub async fn attendees(&self, mid: i64) -> Result<Vec<Attendance>> {
        self.find_one(mid).await?;
        self.store.attendances(mid).await
    }

    /// Attendance records joined with the attendees' profiles.
    pub async fn bookings(&self, mid: i64) -> Result<Vec<Booking>> {
        self.find_one(mid).await?;
        bookings(self.store.as_ref(), mid).await
    }

    pub async fn tags(&self) -> Result<Vec<String>> {
        self.store.distinct_tags().await
    }

    pub async fn calendar(&self, mid: i64) -> Result<CalendarAttachment> {
        let meeting = self.find_one(mid).await?;
        calendar_for(&meeting, &self.calendar, Utc::now())
            .ok_or_else(|| AppError::NotFound(format!("Meeting {mid} has no date yet")))
    }

    pub async fn attach_image(&self, mid: i64, actor: &str, data: &str) -> Result<Meeting> {
        let mut meeting = self.find_owned(mid, actor).await?;

        let name = self.images.save(mid, data).await?;
        meeting.images.push(name);
        self.store.save_meeting(&meeting).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::images::testing::MemoryImageStore;
    use crate::notifications::dispatcher::testing::store_with_users;
    use crate::notifications::outbox::testing::RecordingOutbox;
    use crate::store::MemoryStore;

    pub struct Harness {
        pub store: Arc<MemoryStore>,
        pub outbox: Arc<RecordingOutbox>,
        pub images: Arc<MemoryImageStore>,
    }

    impl Harness {
        pub async fn new() -> Self {
            Self {
                store: store_with_users(&["alice", "bob", "carol"]).await,
                outbox: Arc::new(RecordingOutbox::default()),
                images: Arc::new(MemoryImageStore::default()),
            }
        }

        pub fn calendar() -> CalendarSettings {
            CalendarSettings {
                domain: "evendemy.test".into(),
                organizer: "noreply@evendemy.test".into(),
            }
        }

        pub fn meetings(&self) -> MeetingService {
            MeetingService::new(
                self.store.clone(),
                self.outbox.clone(),
                self.images.clone(),
                Self::calendar(),
            )
        }
    }

    pub fn draft(title: &str) -> MeetingDraft {
        let start = Utc::now() + chrono::Duration::days(7);
        MeetingDraft {
            title: title.to_string(),
            start_time: Some(start),
            end_time: Some(start + chrono::Duration::hours(2)),
            location: Some("Room 1".to_string()),
            number_of_allowed_externals: 1,
            ..Default::default()
        }
    }
}
