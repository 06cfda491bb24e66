use async_trait::async_trait;
use tracing::info;

use crate::calendar::CalendarAttachment;
use crate::utils::error::Result;

/// A rendered mail, sent once to the whole address list.
#[derive(Debug, Clone, PartialEq)]
pub struct Mail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub calendar: Option<CalendarAttachment>,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &Mail) -> Result<()>;
}

/// Logs mails instead of delivering them. Used outside production.
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, mail: &Mail) -> Result<()> {
        info!(
            to = ?mail.to,
            subject = %mail.subject,
            calendar = mail.calendar.is_some(),
            "Mail not sent (development mode)"
        );
        Ok(())
    }
}
