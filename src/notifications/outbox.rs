use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use super::{Dispatcher, Notification};

/// Accepts notifications after the originating change was committed.
/// Enqueueing never blocks and never fails the caller.
pub trait Outbox: Send + Sync {
    fn enqueue(&self, notification: Notification);
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait before attempt `n + 1` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(5),
        }
    }
}

/// Outbox backed by an in-process channel; a background worker delivers
/// every notification in its own task.
pub struct ChannelOutbox {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelOutbox {
    pub fn spawn(dispatcher: Arc<Dispatcher>, policy: RetryPolicy) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(receiver, dispatcher, policy));
        (Self { sender }, worker)
    }
}

impl Outbox for ChannelOutbox {
    fn enqueue(&self, notification: Notification) {
        let kind = notification.kind;
        let meeting_id = notification.meeting.mid;
        if self.sender.send(notification).is_err() {
            error!(?kind, meeting_id, "Notification worker stopped, dropping notification");
        }
    }
}

async fn run(
    mut receiver: mpsc::UnboundedReceiver<Notification>,
    dispatcher: Arc<Dispatcher>,
    policy: RetryPolicy,
) {
    while let Some(notification) = receiver.recv().await {
        tokio::spawn(deliver(dispatcher.clone(), notification, policy));
    }
}

/// Delivers with retries. The final failure is logged and the
/// notification dropped.
pub(crate) async fn deliver(
    dispatcher: Arc<Dispatcher>,
    notification: Notification,
    policy: RetryPolicy,
) -> bool {
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match dispatcher.dispatch(&notification).await {
            Ok(_) => return true,
            Err(e) if attempt < max_attempts => {
                warn!(
                    error = %e,
                    attempt,
                    kind = ?notification.kind,
                    meeting_id = notification.meeting.mid,
                    "Notification failed, retrying"
                );
                tokio::time::sleep(policy.backoff * attempt).await;
            }
            Err(e) => {
                error!(
                    error = %e,
                    attempts = max_attempts,
                    kind = ?notification.kind,
                    meeting_id = notification.meeting.mid,
                    "Notification failed, giving up"
                );
            }
        }
    }
    false
}
