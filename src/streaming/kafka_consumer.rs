use std::{
    collections::HashMap,
    fmt::{Debug, Formatter},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{TimeZone, Utc};
use rdkafka::{
    consumer::{CommitMode, Consumer as _, StreamConsumer},
    message::Headers,
    Message as KafkaMessage,
};

use super::{
    Consumer, ConsumerConfig, KafkaConfig, PollSettings, PolledBatch, ReceivedMessage,
    RecordSource,
};
use crate::{info, task, throw, time, warn, Result, WrapErr};

/// [`RecordSource`] backed by a subscribed Kafka consumer group member.
pub struct KafkaRecordSource {
    consumer: Arc<StreamConsumer>,
    topics: Vec<String>,
    closed: AtomicBool,
}

pub type KafkaConsumer = Consumer<KafkaRecordSource>;

impl KafkaRecordSource {
    pub fn subscribe(
        config: &KafkaConfig,
        consumer_config: &ConsumerConfig,
        topics: &[&str],
    ) -> Result<Self> {
        info!(group_id = %consumer_config.consumer_group_id, ?topics, "initing kafka consumer");

        let mut client_config = config.client_config()?;
        consumer_config.apply(&mut client_config);

        let consumer: StreamConsumer = client_config
            .create()
            .wrap_err("Failed to open connection with Kafka")?;
        consumer
            .subscribe(topics)
            .wrap_err_with(|| format!("Failed to subscribe to {topics:?}"))?;

        Ok(Self {
            consumer: Arc::new(consumer),
            topics: topics.iter().map(|topic| topic.to_string()).collect(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }
}

impl KafkaConsumer {
    /// Subscribes to `topics` as a member of the configured consumer group.
    pub fn connect(
        config: &KafkaConfig,
        consumer_config: &ConsumerConfig,
        topics: &[&str],
    ) -> Result<Self> {
        let source = KafkaRecordSource::subscribe(config, consumer_config, topics)?;
        Ok(Consumer::new(source, PollSettings::from(consumer_config)))
    }
}

#[crate::async_trait]
impl RecordSource for KafkaRecordSource {
    async fn poll_batch(
        &self,
        max_records: usize,
        timeout: Duration,
    ) -> Result<PolledBatch> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(throw!("Kafka consumer for {:?} is closed", self.topics));
        }

        let deadline = time::Instant::now() + timeout;
        let mut batch = PolledBatch::default();

        while batch.consumed() < max_records {
            let received = match time::timeout_at(deadline, self.consumer.recv()).await {
                Ok(Ok(received)) => received,
                // hand out what was already received, the error will surface on the next poll
                Ok(Err(e)) if !batch.is_empty() => {
                    warn!(error = %e, "receive failed mid-batch");
                    break;
                }
                Ok(Err(e)) => return Err(e).wrap_err("Failed to receive message from Kafka"),
                Err(_) => break,
            };

            match decode(&received) {
                Ok(message) => batch.messages.push(message),
                Err(e) => {
                    warn!(
                        topic = received.topic(),
                        partition = received.partition(),
                        offset = received.offset(),
                        error = ?e,
                        "skipping undecodable message"
                    );
                    batch.skipped += 1;
                }
            }
        }

        Ok(batch)
    }

    async fn commit(&self) -> Result<()> {
        let consumer = Arc::clone(&self.consumer);

        task::spawn_blocking(move || consumer.commit_consumer_state(CommitMode::Sync))
            .await?
            .wrap_err("Failed to commit offsets")
    }

    /// Unsubscribes for good. Later polls fail instead of waiting on an empty
    /// subscription.
    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.consumer.unsubscribe();
            info!(topics = ?self.topics, "kafka consumer closed");
        }
    }
}

fn decode<M: KafkaMessage>(message: &M) -> Result<ReceivedMessage> {
    let payload = message.payload().unwrap_or_default();
    let value = serde_json::from_slice(payload).wrap_err("Payload is not valid JSON")?;

    let headers = message
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|header| {
                    let value = header
                        .value
                        .map(|value| String::from_utf8_lossy(value).into_owned())
                        .unwrap_or_default();
                    (header.key.to_string(), value)
                })
                .collect::<HashMap<_, _>>()
        })
        .unwrap_or_default();

    Ok(ReceivedMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message
            .key()
            .map(|key| String::from_utf8_lossy(key).into_owned()),
        value,
        headers,
        timestamp: message
            .timestamp()
            .to_millis()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
    })
}

impl Debug for KafkaRecordSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaRecordSource")
            .field("consumer", &"...")
            .field("topics", &self.topics)
            .finish()
    }
}
