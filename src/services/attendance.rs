use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::bookings;
use super::export::attendees_csv;
use crate::calendar::{calendar_for, CalendarSettings};
use crate::models::{Attendance, Meeting};
use crate::notifications::{Notification, NotificationKind, Outbox, Recipients};
use crate::store::MeetingStore;
use crate::utils::error::{AppError, Result};

/// Registration, cancellation and confirmation of attendees.
pub struct AttendanceService {
    store: Arc<dyn MeetingStore>,
    outbox: Arc<dyn Outbox>,
    calendar: CalendarSettings,
}

impl AttendanceService {
    pub fn new(
        store: Arc<dyn MeetingStore>,
        outbox: Arc<dyn Outbox>,
        calendar: CalendarSettings,
    ) -> Self {
        Self {
            store,
            outbox,
            calendar,
        }
    }

    async fn meeting(&self, mid: i64) -> Result<Meeting> {
        self.store
            .find_meeting(mid, false)
            .await?
            .ok_or_else(|| AppError::meeting_not_found(mid))
    }

    async fn organized_by(&self, mid: i64, actor: &str) -> Result<Meeting> {
        let meeting = self.meeting(mid).await?;
        if !meeting.is_owned_by(actor) {
            return Err(AppError::Forbidden(format!(
                "Only the organizer of meeting {mid} may manage its attendees"
            )));
        }
        Ok(meeting)
    }

    fn not_registered(mid: i64, username: &str) -> AppError {
        AppError::NotFound(format!("{username} is not registered for meeting {mid}"))
    }

    /// Registers `username` (or updates the number of guests of an existing
    /// registration). Only a new registration triggers mails.
    pub async fn attend(
        &self,
        mid: i64,
        username: &str,
        actor: &str,
        externals: i32,
    ) -> Result<Attendance> {
        if actor != username {
            return Err(AppError::Forbidden(
                "Users can only register themselves".to_string(),
            ));
        }
        let meeting = self.meeting(mid).await?;
        if !(0..=meeting.number_of_allowed_externals).contains(&externals) {
            return Err(AppError::ValidationError(format!(
                "externals must be between 0 and {}",
                meeting.number_of_allowed_externals
            )));
        }

        let now = Utc::now();
        let (saved, is_new) = self
            .store
            .register_attendance(mid, username, externals, now)
            .await?;
        info!(meeting_id = mid, username, externals, is_new, "Attendance saved");

        if is_new {
            self.outbox.enqueue(
                Notification::new(
                    NotificationKind::AttendanceConfirmation,
                    meeting.clone(),
                    Recipients::user(username),
                )
                .actor(username)
                .calendar(calendar_for(&meeting, &self.calendar, now)),
            );
            let owner = meeting.username.clone();
            self.outbox.enqueue(
                Notification::new(NotificationKind::NewAttendee, meeting, Recipients::user(&owner))
                    .actor(username),
            );
        }
        Ok(saved)
    }

    /// Removes a registration. Attendees may leave on their own; the organizer
    /// may remove anyone, which the attendee is told as a rejection.
    pub async fn leave(&self, mid: i64, username: &str, actor: &str) -> Result<Attendance> {
        let meeting = self.meeting(mid).await?;

        let (kind, recipients) = if actor == username {
            (NotificationKind::AttendeeLeft, Recipients::user(&meeting.username))
        } else if meeting.is_owned_by(actor) {
            (NotificationKind::ParticipationRejected, Recipients::user(username))
        } else {
            return Err(AppError::Forbidden(
                "Only the attendee or the organizer may cancel a registration".to_string(),
            ));
        };

        let removed = self
            .store
            .delete_attendance(mid, username)
            .await?
            .ok_or_else(|| Self::not_registered(mid, username))?;
        info!(meeting_id = mid, username, actor, "Attendance removed");

        self.outbox
            .enqueue(Notification::new(kind, meeting, recipients).actor(actor));
        Ok(removed)
    }

    /// Marks that `username` actually took part.
    pub async fn confirm(&self, mid: i64, username: &str, actor: &str) -> Result<Attendance> {
        self.organized_by(mid, actor).await?;

        let mut attendance = self
            .store
            .find_attendance(mid, username)
            .await?
            .ok_or_else(|| Self::not_registered(mid, username))?;
        attendance.confirm(Utc::now());

        let saved = self.store.upsert_attendance(&attendance).await?;
        info!(meeting_id = mid, username, "Participation confirmed");
        Ok(saved)
    }

    pub async fn reject(&self, mid: i64, username: &str, actor: &str) -> Result<Attendance> {
        let meeting = self.organized_by(mid, actor).await?;

        let removed = self
            .store
            .delete_attendance(mid, username)
            .await?
            .ok_or_else(|| Self::not_registered(mid, username))?;
        info!(meeting_id = mid, username, "Participation rejected");

        self.outbox.enqueue(
            Notification::new(
                NotificationKind::ParticipationRejected,
                meeting,
                Recipients::user(username),
            )
            .actor(actor),
        );
        Ok(removed)
    }

    /// Attendee list as CSV; only the organizer may download it.
    pub async fn export_csv(&self, mid: i64, actor: &str) -> Result<String> {
        self.organized_by(mid, actor).await?;

        let bookings = bookings(self.store.as_ref(), mid).await?;
        Ok(attendees_csv(&bookings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MeetingDraft;
    use crate::services::meetings::testing::{draft, Harness};

    fn attendance(harness: &Harness) -> AttendanceService {
        AttendanceService::new(
            harness.store.clone(),
            harness.outbox.clone(),
            Harness::calendar(),
        )
    }

    async fn setup() -> (Harness, AttendanceService, Meeting) {
        let harness = Harness::new().await;
        let meeting = harness
            .meetings()
            .create("alice", draft("Rust 101"))
            .await
            .unwrap();
        harness.outbox.take();
        let service = attendance(&harness);
        (harness, service, meeting)
    }

    #[tokio::test]
    async fn test_attend_confirms_to_user_and_informs_owner() {
        let (harness, service, meeting) = setup().await;

        let attendance = service.attend(meeting.mid, "bob", "bob", 1).await.unwrap();

        assert_eq!(attendance.externals, 1);
        assert!(!attendance.took_part);
        let sent = harness.outbox.take();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].kind, NotificationKind::AttendanceConfirmation);
        assert_eq!(sent[0].recipients, Recipients::user("bob"));
        assert!(sent[0].calendar.is_some());
        assert_eq!(sent[1].kind, NotificationKind::NewAttendee);
        assert_eq!(sent[1].recipients, Recipients::user("alice"));
        assert_eq!(sent[1].actor.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn test_attend_twice_keeps_one_record() {
        let (harness, service, meeting) = setup().await;

        let first = service.attend(meeting.mid, "bob", "bob", 0).await.unwrap();
        harness.outbox.take();
        let second = service.attend(meeting.mid, "bob", "bob", 1).await.unwrap();

        assert_eq!(second.date_of_registration, first.date_of_registration);
        assert_eq!(second.externals, 1);
        assert_eq!(harness.store.attendances(meeting.mid).await.unwrap().len(), 1);
        assert!(harness.outbox.take().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_first_registrations_notify_once() {
        let (harness, service, meeting) = setup().await;

        let (first, second) = tokio::join!(
            service.attend(meeting.mid, "bob", "bob", 0),
            service.attend(meeting.mid, "bob", "bob", 1),
        );
        first.unwrap();
        second.unwrap();

        let kinds: Vec<NotificationKind> = harness.outbox.take().iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NotificationKind::AttendanceConfirmation,
                NotificationKind::NewAttendee
            ]
        );
        assert_eq!(harness.store.attendances(meeting.mid).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_attend_idea_without_calendar() {
        let (harness, service, _) = setup().await;
        let idea = harness
            .meetings()
            .create(
                "alice",
                MeetingDraft {
                    title: "Someday".into(),
                    is_idea: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        harness.outbox.take();

        service.attend(idea.mid, "bob", "bob", 0).await.unwrap();

        let sent = harness.outbox.take();
        assert!(sent[0].calendar.is_none());
    }

    #[tokio::test]
    async fn test_attend_rejects_invalid_requests() {
        let (_harness, service, meeting) = setup().await;

        assert!(matches!(
            service.attend(meeting.mid, "bob", "carol", 0).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            service.attend(meeting.mid, "bob", "bob", 2).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            service.attend(meeting.mid, "bob", "bob", -1).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            service.attend(404, "bob", "bob", 0).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_leave_by_attendee_informs_owner() {
        let (harness, service, meeting) = setup().await;
        service.attend(meeting.mid, "bob", "bob", 0).await.unwrap();
        harness.outbox.take();

        service.leave(meeting.mid, "bob", "bob").await.unwrap();

        let sent = harness.outbox.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::AttendeeLeft);
        assert_eq!(sent[0].recipients, Recipients::user("alice"));
        assert!(harness.store.attendances(meeting.mid).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_leave_by_owner_is_a_rejection() {
        let (harness, service, meeting) = setup().await;
        service.attend(meeting.mid, "bob", "bob", 0).await.unwrap();
        harness.outbox.take();

        service.leave(meeting.mid, "bob", "alice").await.unwrap();

        let sent = harness.outbox.take();
        assert_eq!(sent[0].kind, NotificationKind::ParticipationRejected);
        assert_eq!(sent[0].recipients, Recipients::user("bob"));
    }

    #[tokio::test]
    async fn test_leave_by_stranger_is_forbidden() {
        let (harness, service, meeting) = setup().await;
        service.attend(meeting.mid, "bob", "bob", 0).await.unwrap();

        assert!(matches!(
            service.leave(meeting.mid, "bob", "carol").await,
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(harness.store.attendances(meeting.mid).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_leave_without_registration_is_not_found() {
        let (harness, service, meeting) = setup().await;

        assert!(matches!(
            service.leave(meeting.mid, "bob", "bob").await,
            Err(AppError::NotFound(_))
        ));
        assert!(harness.outbox.take().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_sets_took_part() {
        let (_harness, service, meeting) = setup().await;
        service.attend(meeting.mid, "bob", "bob", 0).await.unwrap();

        assert!(matches!(
            service.confirm(meeting.mid, "bob", "bob").await,
            Err(AppError::Forbidden(_))
        ));
        let confirmed = service.confirm(meeting.mid, "bob", "alice").await.unwrap();

        assert!(confirmed.took_part);
        assert!(confirmed.date_of_confirmation.is_some());
    }

    #[tokio::test]
    async fn test_reject_removes_and_notifies() {
        let (harness, service, meeting) = setup().await;
        service.attend(meeting.mid, "bob", "bob", 0).await.unwrap();
        harness.outbox.take();

        let removed = service.reject(meeting.mid, "bob", "alice").await.unwrap();

        assert_eq!(removed.username, "bob");
        let sent = harness.outbox.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::ParticipationRejected);
    }

    #[tokio::test]
    async fn test_export_is_owner_only() {
        let (_harness, service, meeting) = setup().await;
        service.attend(meeting.mid, "bob", "bob", 1).await.unwrap();

        let csv = service.export_csv(meeting.mid, "alice").await.unwrap();

        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains("bob,Bob,Tester,bob@example.com,1,false,"));
        assert!(matches!(
            service.export_csv(meeting.mid, "bob").await,
            Err(AppError::Forbidden(_))
        ));
    }
}
