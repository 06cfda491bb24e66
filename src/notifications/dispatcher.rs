use std::sync::Arc;

use tracing::{debug, info};

use super::render::{context, render};
use super::transport::{Mail, MailTransport};
use super::{Notification, NotificationKind, Recipients};
use crate::config::MailTemplates;
use crate::store::MeetingStore;
use crate::utils::error::Result;

/// Renders notifications with the configured templates and hands them to
/// the mail transport.
pub struct Dispatcher {
    store: Arc<dyn MeetingStore>,
    transport: Arc<dyn MailTransport>,
    templates: MailTemplates,
    from: String,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn MeetingStore>,
        transport: Arc<dyn MailTransport>,
        templates: MailTemplates,
        from: impl Into<String>,
    ) -> Self {
        Self {
            store,
            transport,
            templates,
            from: from.into(),
        }
    }

    async fn addresses(&self, recipients: &Recipients) -> Result<Vec<String>> {
        let users = match recipients {
            Recipients::AllUsers => self.store.all_users().await?,
            Recipients::Users(usernames) if usernames.is_empty() => Vec::new(),
            Recipients::Users(usernames) => self.store.find_users(usernames).await?,
        };

        let mut addresses: Vec<String> = users
            .into_iter()
            .map(|u| u.email)
            .filter(|email| !email.trim().is_empty())
            .collect();
        addresses.sort();
        addresses.dedup();
        Ok(addresses)
    }

    /// Builds the mail for `notification`, or `None` when nobody is left to
    /// receive it.
    pub async fn prepare(&self, notification: &Notification) -> Result<Option<Mail>> {
        let to = self.addresses(&notification.recipients).await?;
        if to.is_empty() {
            return Ok(None);
        }

        let actor = match &notification.actor {
            Some(username) => self.store.find_user(username).await?,
            None => None,
        };

        let meeting = &notification.meeting;
        let template = self.templates.template(notification.kind, meeting.is_idea);
        let body_template = match (&notification.calendar, &template.body_no_calendar) {
            (None, Some(without_calendar))
                if notification.kind == NotificationKind::AttendanceConfirmation =>
            {
                without_calendar
            }
            _ => &template.body,
        };

        let values = context(meeting, actor.as_ref(), notification.text.as_deref());
        Ok(Some(Mail {
            from: self.from.clone(),
            to,
            subject: render(&template.subject, &values),
            body: render(body_template, &values),
            calendar: notification.calendar.clone(),
        }))
    }

    /// Sends one mail for `notification`. Returns the number of addresses
    /// it went to.
    pub async fn dispatch(&self, notification: &Notification) -> Result<usize> {
        let Some(mail) = self.prepare(notification).await? else {
            debug!(
                kind = ?notification.kind,
                meeting_id = notification.meeting.mid,
                "No recipients for notification"
            );
            return Ok(0);
        };

        self.transport.send(&mail).await?;
        info!(
            kind = ?notification.kind,
            meeting_id = notification.meeting.mid,
            recipients = mail.to.len(),
            "Notification sent"
        );
        Ok(mail.to.len())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::models::User;
    use crate::store::MemoryStore;
    use crate::utils::error::AppError;

    /// Transport that keeps sent mails and can be told to fail.
    #[derive(Default)]
    pub struct RecordingTransport {
        pub sent: Mutex<Vec<Mail>>,
        pub failures_left: Mutex<u32>,
    }

    impl RecordingTransport {
        pub fn failing(times: u32) -> Self {
            Self {
                sent: Mutex::default(),
                failures_left: Mutex::new(times),
            }
        }
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn send(&self, mail: &Mail) -> Result<()> {
            let mut failures = self.failures_left.lock().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(AppError::ExternalServiceError("relay down".into()));
            }
            self.sent.lock().await.push(mail.clone());
            Ok(())
        }
    }

    pub fn user(username: &str) -> User {
        User {
            username: username.to_string(),
            firstname: username[..1].to_uppercase() + &username[1..],
            lastname: "Tester".to_string(),
            email: format!("{username}@example.com"),
        }
    }

    pub async fn store_with_users(usernames: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for name in usernames {
            store.upsert_user(user(name)).await;
        }
        store
    }
}
