use std::time::Duration;

use super::message::Message;

/// Publishing side of the broker, as seen by the rest of the crate.
#[crate::async_trait]
pub trait StreamingClient: Sync + Send + 'static {
    /// Publishes a message and waits up to `timeout` for the broker acknowledgement.
    ///
    /// `Ok(false)` means no acknowledgement arrived in time. Transport and broker
    /// failures are returned as errors.
    async fn send_sync(&self, message: Message, timeout: Duration) -> crate::Result<bool>;

    async fn health_check(&self) -> crate::Result<()>;

    /// Blocks until every in-flight message is delivered or `timeout` elapses.
    fn flush(&self, timeout: Duration) -> crate::Result<()>;
}
