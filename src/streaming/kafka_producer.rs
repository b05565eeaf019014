use std::{
    fmt::{Debug, Formatter},
    time::Duration,
};

use rdkafka::{
    error::{KafkaError, RDKafkaErrorCode},
    message::{Header, OwnedHeaders},
    producer::{DeliveryFuture, FutureProducer, FutureRecord, Producer},
};

use super::{KafkaConfig, Message, ProducerConfig, StreamingClient};

use crate::{debug, info, task, throw, warn, Result, WrapErr};

const METADATA_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
    health_check_topic: String,
}

impl KafkaProducer {
    /// Creates a producer connected to the broker.
    ///
    /// The connection is validated immediately after creation, and if not connected, the
    /// producer creation will fail with an error.
    pub async fn new(config: &KafkaConfig, producer_config: &ProducerConfig) -> Result<Self> {
        info!(config = ?config, producer = ?producer_config, "initing kafka producer");

        let mut client_config = config.client_config()?;
        producer_config.apply(&mut client_config);

        let producer = KafkaProducer {
            producer: client_config
                .create()
                .wrap_err("Failed to open connection with Kafka")?,
            health_check_topic: config.kafka_health_check_topic.clone(),
        };

        producer.health_check().await?;

        Ok(producer)
    }

    /// Hands a message to the producer queue without waiting for the broker.
    ///
    /// Fails only if the message cannot be enqueued (e.g. the local queue is full).
    pub fn send(&self, message: &Message) -> Result<PendingDelivery> {
        let mut kafka_headers = OwnedHeaders::new_with_capacity(message.headers.len());
        for (key, value) in &message.headers {
            kafka_headers = kafka_headers.insert(Header {
                key: key.as_str(),
                value: Some(value),
            });
        }

        let record = FutureRecord::to(&message.topic)
            .key(message.key.as_str())
            .payload(message.payload.as_str())
            .headers(kafka_headers)
            .timestamp(message.timestamp.timestamp_millis());

        let delivery = self
            .producer
            .send_result(record)
            .map_err(|(e, _)| e)
            .wrap_err_with(|| format!("Failed to enqueue message {}", message.id))?;

        Ok(PendingDelivery {
            message_id: message.id.clone(),
            delivery,
        })
    }
}

/// A message accepted by the producer queue whose broker acknowledgement is pending.
pub struct PendingDelivery {
    message_id: String,
    delivery: DeliveryFuture,
}

impl PendingDelivery {
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Waits for the acknowledgement and returns the `(partition, offset)` it was
    /// written to.
    pub async fn wait(self) -> Result<(i32, i64)> {
        match self.delivery.await {
            Ok(Ok(position)) => Ok(position),
            Ok(Err((e, _))) => Err(e)
                .wrap_err_with(|| format!("Failed to deliver message {}", self.message_id)),
            Err(_) => Err(throw!(
                "Delivery of message {} was canceled",
                self.message_id
            )),
        }
    }
}

impl Debug for PendingDelivery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingDelivery")
            .field("message_id", &self.message_id)
            .finish_non_exhaustive()
    }
}

#[crate::async_trait]
impl StreamingClient for KafkaProducer {
    async fn send_sync(&self, message: Message, timeout: Duration) -> Result<bool> {
        let pending = self.send(&message)?;

        match tokio::time::timeout(timeout, pending.delivery).await {
            Ok(Ok(Ok((partition, offset)))) => {
                debug!(message_id = %message.id, topic = %message.topic, partition, offset, "message acknowledged");
                Ok(true)
            }
            Ok(Ok(Err((KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut), _))))
            | Err(_) => {
                warn!(message_id = %message.id, topic = %message.topic, ?timeout, "timed out waiting for broker acknowledgement");
                Ok(false)
            }
            Ok(Ok(Err((e, _)))) => {
                Err(e).wrap_err_with(|| format!("Failed to deliver message {}", message.id))
            }
            Ok(Err(_)) => Err(throw!("Delivery of message {} was canceled", message.id)),
        }
    }

    async fn health_check(&self) -> Result<()> {
        let producer = self.producer.clone();
        let topic = self.health_check_topic.clone();

        task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(Some(topic.as_str()), METADATA_TIMEOUT)
                .map(|_| ())
        })
        .await?
        .wrap_err("Failed to check Kafka health")
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer
            .flush(timeout)
            .wrap_err("Failed to flush Kafka producer")
    }
}

impl Debug for KafkaProducer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaProducer")
            .field("producer", &"...")
            .field("health_check_topic", &self.health_check_topic)
            .finish_non_exhaustive()
    }
}
