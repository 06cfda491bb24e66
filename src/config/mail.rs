use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::notifications::NotificationKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailTemplate {
    pub subject: String,
    pub body: String,
    /// Used instead of `body` when no calendar entry can be attached.
    #[serde(default)]
    pub body_no_calendar: Option<String>,
}

impl MailTemplate {
    fn new(subject: &str, body: &str) -> Self {
        Self {
            subject: subject.to_string(),
            body: body.to_string(),
            body_no_calendar: None,
        }
    }
}

/// Wording for an idea and for a scheduled meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateVariants {
    pub idea: MailTemplate,
    pub meeting: MailTemplate,
}

/// One entry per [`NotificationKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailTemplates {
    pub new_meeting: TemplateVariants,
    pub time_changed: TemplateVariants,
    pub location_changed: TemplateVariants,
    pub new_comment: TemplateVariants,
    pub new_attendee: TemplateVariants,
    pub attendee_left: TemplateVariants,
    pub attendance_confirmation: TemplateVariants,
    pub participation_rejected: TemplateVariants,
    pub deleted_meeting: TemplateVariants,
}

impl MailTemplates {
    pub fn variants(&self, kind: NotificationKind) -> &TemplateVariants {
        match kind {
            NotificationKind::NewMeeting => &self.new_meeting,
            NotificationKind::TimeChanged => &self.time_changed,
            NotificationKind::LocationChanged => &self.location_changed,
            NotificationKind::NewComment => &self.new_comment,
            NotificationKind::NewAttendee => &self.new_attendee,
            NotificationKind::AttendeeLeft => &self.attendee_left,
            NotificationKind::AttendanceConfirmation => &self.attendance_confirmation,
            NotificationKind::ParticipationRejected => &self.participation_rejected,
            NotificationKind::DeletedMeeting => &self.deleted_meeting,
        }
    }

    pub fn template(&self, kind: NotificationKind, is_idea: bool) -> &MailTemplate {
        let variants = self.variants(kind);
        if is_idea {
            &variants.idea
        } else {
            &variants.meeting
        }
    }

    /// Reads templates from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Templates {
            path: path.display().to_string(),
            source,
        })
    }
}

impl Default for MailTemplates {
    fn default() -> Self {
        let pair = |idea: MailTemplate, meeting: MailTemplate| TemplateVariants { idea, meeting };

        let mut confirm_meeting = MailTemplate::new(
            "You are registered for {{title}}",
            "Hello {{firstname}},\n\nyou are registered for \"{{title}}\" on {{startTime}} \
             in {{location}}. The calendar entry is attached.",
        );
        confirm_meeting.body_no_calendar = Some(
            "Hello {{firstname}},\n\nyou are registered for \"{{title}}\". \
             The date will be announced later."
                .to_string(),
        );

        Self {
            new_meeting: pair(
                MailTemplate::new(
                    "New idea: {{title}}",
                    "{{owner}} has a new idea: \"{{title}}\"\n\n{{shortDescription}}",
                ),
                MailTemplate::new(
                    "New meeting: {{title}}",
                    "{{owner}} announced \"{{title}}\" on {{startTime}} in {{location}}.\n\n\
                     {{shortDescription}}",
                ),
            ),
            time_changed: pair(
                MailTemplate::new(
                    "The idea {{title}} got a date",
                    "\"{{title}}\" is now planned for {{text}}.",
                ),
                MailTemplate::new(
                    "New date for {{title}}",
                    "\"{{title}}\" was moved to {{text}}. The updated calendar entry is attached.",
                ),
            ),
            location_changed: pair(
                MailTemplate::new(
                    "New location for the idea {{title}}",
                    "\"{{title}}\" will take place in {{location}}.",
                ),
                MailTemplate::new(
                    "New location for {{title}}",
                    "\"{{title}}\" on {{startTime}} now takes place in {{location}}.",
                ),
            ),
            new_comment: pair(
                MailTemplate::new(
                    "New comment on the idea {{title}}",
                    "{{firstname}} {{lastname}} wrote on \"{{title}}\":\n\n{{text}}",
                ),
                MailTemplate::new(
                    "New comment on {{title}}",
                    "{{firstname}} {{lastname}} wrote on \"{{title}}\":\n\n{{text}}",
                ),
            ),
            new_attendee: pair(
                MailTemplate::new(
                    "{{firstname}} {{lastname}} is interested in {{title}}",
                    "{{firstname}} {{lastname}} is interested in your idea \"{{title}}\".",
                ),
                MailTemplate::new(
                    "{{firstname}} {{lastname}} attends {{title}}",
                    "{{firstname}} {{lastname}} registered for \"{{title}}\".",
                ),
            ),
            attendee_left: pair(
                MailTemplate::new(
                    "{{firstname}} {{lastname}} lost interest in {{title}}",
                    "{{firstname}} {{lastname}} is no longer interested in \"{{title}}\".",
                ),
                MailTemplate::new(
                    "{{firstname}} {{lastname}} cancelled {{title}}",
                    "{{firstname}} {{lastname}} no longer attends \"{{title}}\".",
                ),
            ),
            attendance_confirmation: pair(
                MailTemplate::new(
                    "You are interested in {{title}}",
                    "Hello {{firstname}},\n\nyou will be informed when \"{{title}}\" gets a date.",
                ),
                confirm_meeting,
            ),
            participation_rejected: pair(
                MailTemplate::new(
                    "Your interest in {{title}}",
                    "Hello {{firstname}},\n\nthe organizer removed you from the idea \"{{title}}\".",
                ),
                MailTemplate::new(
                    "Your registration for {{title}}",
                    "Hello {{firstname}},\n\nthe organizer removed you from \"{{title}}\".",
                ),
            ),
            deleted_meeting: pair(
                MailTemplate::new(
                    "The idea {{title}} was withdrawn",
                    "The idea \"{{title}}\" was withdrawn by {{owner}}.",
                ),
                MailTemplate::new(
                    "{{title}} was cancelled",
                    "\"{{title}}\" on {{startTime}} was cancelled by {{owner}}.",
                ),
            ),
        }
    }
}
