mod consumer;
mod kafka_config;
mod kafka_consumer;
mod kafka_producer;
mod message;
mod stream_service;
mod streaming_client;
mod topic;
mod topic_manager;

pub use consumer::{
    Consumer, Handler, PollSettings, PolledBatch, ReceivedMessage, RecordSource, StopHandle,
};
pub use kafka_config::{ConsumerConfig, KafkaConfig, ProducerConfig, SaslMechanism, SecurityProtocol};
pub use kafka_consumer::{KafkaConsumer, KafkaRecordSource};
pub use kafka_producer::{KafkaProducer, PendingDelivery};
pub use message::Message;
pub use stream_service::{StreamKind, StreamService, SOURCE_HEADER_VALUE};
pub use streaming_client::StreamingClient;
pub use topic::{CleanupPolicy, CompressionType, TopicConfig, DEFAULT_RETENTION_MS};
pub use topic_manager::{KafkaTopicManager, TopicAdmin};
