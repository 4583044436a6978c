use crate::models::{InboxMessage, Mailbox};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailboxProvider: Send + Sync {
    /// Creates the disposable mailbox and keeps its access token
    async fn create_mailbox(&mut self) -> anyhow::Result<Mailbox>;

    /// Polls until the inbox is non-empty; an exhausted budget yields an empty list
    async fn poll_inbox(
        &self,
        max_attempts: u32,
        interval: Duration,
        attempt_timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<InboxMessage>>;

    /// Fetches a single message with its full body
    async fn fetch_message(&self, id: &str) -> anyhow::Result<InboxMessage>;

    /// Best-effort removal of one message; `Ok(false)` when the provider refused
    async fn delete_message(&self, id: &str) -> anyhow::Result<bool>;

    /// Best-effort removal of the mailbox; clears the held token on success
    async fn delete_mailbox(&mut self) -> bool;
}
