//! Mail notifications about meeting changes.
//!
//! Services never send mail themselves. They describe what happened as a
//! [`Notification`] and hand it to an [`Outbox`] once their change is
//! persisted; the [`Dispatcher`] turns it into a rendered mail later.

use serde::{Deserialize, Serialize};

use crate::calendar::CalendarAttachment;
use crate::models::{Attendance, Meeting};

pub mod dispatcher;
pub mod outbox;
pub mod render;
pub mod smtp;
pub mod transport;

pub use dispatcher::Dispatcher;
pub use outbox::{ChannelOutbox, Outbox, RetryPolicy};
pub use transport::{LogTransport, Mail, MailTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    NewMeeting,
    TimeChanged,
    LocationChanged,
    NewComment,
    NewAttendee,
    AttendeeLeft,
    AttendanceConfirmation,
    ParticipationRejected,
    DeletedMeeting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    AllUsers,
    Users(Vec<String>),
}

impl Recipients {
    pub fn user(username: &str) -> Self {
        Recipients::Users(vec![username.to_string()])
    }

    pub fn attendees(attendances: &[Attendance]) -> Self {
        Recipients::Users(attendances.iter().map(|a| a.username.clone()).collect())
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    /// Snapshot taken right after the change was persisted.
    pub meeting: Meeting,
    pub recipients: Recipients,
    /// User whose action caused the notification.
    pub actor: Option<String>,
    /// Comment body or the human-readable new date.
    pub text: Option<String>,
    pub calendar: Option<CalendarAttachment>,
}

impl Notification {
    pub fn new(kind: NotificationKind, meeting: Meeting, recipients: Recipients) -> Self {
        Self {
            kind,
            meeting,
            recipients,
            actor: None,
            text: None,
            calendar: None,
        }
    }

    pub fn actor(mut self, username: &str) -> Self {
        self.actor = Some(username.to_string());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn calendar(mut self, calendar: Option<CalendarAttachment>) -> Self {
        self.calendar = calendar;
        self
    }
}
