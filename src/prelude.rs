pub use crate::{
    config::{ConfigError, Validate},
    sensitive::Sensitive,
    telemetry::{Tracing, TracingConfig, TracingFormat},
    Config, Environment, EnvironmentConfig,
};

pub use crate::streaming::{
    Consumer, ConsumerConfig, KafkaConfig, KafkaConsumer, KafkaProducer, KafkaTopicManager,
    Message, ProducerConfig, ReceivedMessage, StreamKind, StreamService, StreamingClient,
    TopicAdmin, TopicConfig,
};

// Traits
pub use clap::{self, Args, Parser};
pub use thiserror::Error;

// Type Replacements
pub use eyre::{Result, WrapErr};
pub use tokio::{sync, task, time};

pub use tracing::{debug, error, info, instrument, instrument::Instrument, span, trace, warn};

// Feature enablement
#[async_trait::async_trait]
pub trait Feature {
    async fn init(service_name: &str, config: EnvironmentConfig) -> Result<Self>
    where
        Self: Sized;
}
