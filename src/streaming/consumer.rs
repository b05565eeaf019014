use std::{
    collections::HashMap,
    fmt::{Debug, Formatter},
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ConsumerConfig;
use crate::{debug, error, info, throw, time, Result, WrapErr};

/// Callback invoked for every message received on the topic it is registered for.
pub type Handler = Arc<dyn Fn(&ReceivedMessage) -> Result<()> + Send + Sync>;

/// A message fetched from the broker with its JSON payload decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub value: Value,
    pub headers: HashMap<String, String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ReceivedMessage {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.value.clone()).wrap_err_with(|| {
            format!(
                "Failed to decode message {}/{}@{}",
                self.topic, self.partition, self.offset
            )
        })
    }
}

/// The records one poll took from the broker. `skipped` counts records that were
/// consumed but could not be decoded; their offsets advance with the batch commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolledBatch {
    pub messages: Vec<ReceivedMessage>,
    pub skipped: usize,
}

impl PolledBatch {
    /// Records taken from the broker, decodable or not.
    pub fn consumed(&self) -> usize {
        self.messages.len() + self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.consumed() == 0
    }
}

impl From<Vec<ReceivedMessage>> for PolledBatch {
    fn from(messages: Vec<ReceivedMessage>) -> Self {
        Self {
            messages,
            skipped: 0,
        }
    }
}

/// Where the consumer loop gets its batches from and commits them to.
#[crate::async_trait]
pub trait RecordSource: Send + Sync + 'static {
    /// Waits at most `timeout` and consumes up to `max_records` records. An empty batch
    /// means nothing arrived in time.
    async fn poll_batch(&self, max_records: usize, timeout: Duration) -> Result<PolledBatch>;

    /// Commits the positions of every message returned so far.
    async fn commit(&self) -> Result<()>;

    fn close(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub max_records: usize,
    pub timeout: Duration,
}

impl From<&ConsumerConfig> for PollSettings {
    fn from(config: &ConsumerConfig) -> Self {
        Self {
            max_records: config.consumer_max_poll_records,
            timeout: config.poll_timeout(),
        }
    }
}

/// Stops a running consumer loop from anywhere.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// The loop notices between poll cycles, so it exits within one poll timeout.
    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Polls a [`RecordSource`] in a loop and dispatches each message to the handler
/// registered for its topic.
///
/// Offsets are committed once per batch, after every message of the batch has been
/// handed to its handler. A crash between dispatch and commit redelivers the whole
/// batch: delivery is at-least-once.
pub struct Consumer<S> {
    source: S,
    handlers: HashMap<String, Handler>,
    settings: PollSettings,
    running: Arc<AtomicBool>,
    active: AtomicBool,
}

impl<S: RecordSource> Consumer<S> {
    pub fn new(source: S, settings: PollSettings) -> Self {
        Self {
            source,
            handlers: HashMap::new(),
            settings,
            running: Arc::new(AtomicBool::new(false)),
            active: AtomicBool::new(false),
        }
    }

    /// Registers the handler for `topic`, replacing any previous one.
    pub fn register_callback<F>(&mut self, topic: impl Into<String>, handler: F)
    where
        F: Fn(&ReceivedMessage) -> Result<()> + Send + Sync + 'static,
    {
        let topic = topic.into();
        if self
            .handlers
            .insert(topic.clone(), Arc::new(handler))
            .is_some()
        {
            debug!(topic = %topic, "replaced callback");
        } else {
            debug!(topic = %topic, "registered callback");
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.running))
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Runs the poll loop until [`Consumer::stop_consuming`] is called, then closes the
    /// source. Fails immediately if the loop is already running.
    pub async fn start_consuming(&self) -> Result<()> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(throw!("Consumer loop is already running"));
        }
        let _active = ActiveGuard(&self.active);

        self.running.store(true, Ordering::SeqCst);
        info!(topics = ?self.handlers.keys().collect::<Vec<_>>(), "consumer loop started");

        while self.running.load(Ordering::SeqCst) {
            self.poll_cycle().await;
        }

        self.source.close();
        info!("consumer loop stopped");

        Ok(())
    }

    pub fn stop_consuming(&self) {
        self.stop_handle().stop();
    }

    async fn poll_cycle(&self) {
        let batch = match self
            .source
            .poll_batch(self.settings.max_records, self.settings.timeout)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = ?e, "failed to poll messages");
                time::sleep(self.settings.timeout).await;
                return;
            }
        };

        if batch.is_empty() {
            return;
        }

        let handled = batch
            .messages
            .iter()
            .filter(|message| self.dispatch(message))
            .count();

        if let Err(e) = self.source.commit().await {
            error!(error = ?e, batch = batch.consumed(), "failed to commit offsets");
            return;
        }

        debug!(
            batch = batch.messages.len(),
            skipped = batch.skipped,
            handled,
            "batch dispatched and committed"
        );
    }

    fn dispatch(&self, message: &ReceivedMessage) -> bool {
        let Some(handler) = self.handlers.get(&message.topic) else {
            debug!(topic = %message.topic, offset = message.offset, "no callback registered, dropping message");
            return false;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| handler(message))) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(topic = %message.topic, partition = message.partition, offset = message.offset, error = ?e, "callback failed");
                false
            }
            Err(_) => {
                error!(topic = %message.topic, partition = message.partition, offset = message.offset, "callback panicked");
                false
            }
        }
    }
}

impl<S> Debug for Consumer<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("topics", &self.handlers.keys().collect::<Vec<_>>())
            .field("settings", &self.settings)
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

struct ActiveGuard<'a>(&'a AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
