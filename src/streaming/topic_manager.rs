use std::{
    collections::HashSet,
    fmt::{Debug, Formatter},
    sync::Arc,
    time::Duration,
};

use rdkafka::{
    admin::{AdminClient, AdminOptions, NewTopic, TopicReplication},
    client::DefaultClientContext,
    types::RDKafkaErrorCode,
};

use super::{KafkaConfig, TopicConfig};
use crate::{error, info, task, warn, Result, WrapErr};

/// Administrative topic operations. Every call is a single round-trip to the broker;
/// failures are logged and reported through the return value, never retried.
#[crate::async_trait]
pub trait TopicAdmin: Send + Sync + 'static {
    async fn create_topic(&self, spec: &TopicConfig) -> bool;

    /// Names of every topic known to the broker. Empty if the broker cannot be reached.
    async fn list_topics(&self) -> HashSet<String>;

    async fn delete_topic(&self, name: &str) -> bool;
}

pub struct KafkaTopicManager {
    admin: Arc<AdminClient<DefaultClientContext>>,
    operation_timeout: Duration,
}

impl KafkaTopicManager {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        info!(bootstrap_servers = %config.kafka_bootstrap_servers, "initing kafka topic manager");

        let admin = config
            .client_config()?
            .create()
            .wrap_err("Failed to create Kafka admin client")?;

        Ok(Self {
            admin: Arc::new(admin),
            operation_timeout: config.admin_timeout(),
        })
    }

    fn options(&self) -> AdminOptions {
        AdminOptions::new()
            .operation_timeout(Some(self.operation_timeout))
            .request_timeout(Some(self.operation_timeout))
    }
}

#[crate::async_trait]
impl TopicAdmin for KafkaTopicManager {
    async fn create_topic(&self, spec: &TopicConfig) -> bool {
        if let Err(e) = spec.validate() {
            error!(topic = %spec.name, error = %e, "refusing to create invalid topic");
            return false;
        }

        let settings = spec.settings();
        let mut new_topic = NewTopic::new(
            &spec.name,
            spec.num_partitions,
            TopicReplication::Fixed(spec.replication_factor),
        );
        for (key, value) in &settings {
            new_topic = new_topic.set(key, value);
        }

        let results = match self.admin.create_topics(&[new_topic], &self.options()).await {
            Ok(results) => results,
            Err(e) => {
                error!(topic = %spec.name, error = %e, "failed to create topic");
                return false;
            }
        };

        results.into_iter().all(|result| match result {
            Ok(name) => {
                info!(topic = %name, partitions = spec.num_partitions, "created topic");
                true
            }
            Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                warn!(topic = %name, "topic already exists");
                false
            }
            Err((name, code)) => {
                error!(topic = %name, error = %code, "failed to create topic");
                false
            }
        })
    }

    async fn list_topics(&self) -> HashSet<String> {
        let admin = Arc::clone(&self.admin);
        let timeout = self.operation_timeout;

        let metadata = task::spawn_blocking(move || {
            admin.inner().fetch_metadata(None, timeout).map(|metadata| {
                metadata
                    .topics()
                    .iter()
                    .map(|topic| topic.name().to_string())
                    .collect::<HashSet<_>>()
            })
        })
        .await;

        match metadata {
            Ok(Ok(topics)) => topics,
            Ok(Err(e)) => {
                error!(error = %e, "failed to list topics");
                HashSet::new()
            }
            Err(e) => {
                error!(error = %e, "topic listing task failed");
                HashSet::new()
            }
        }
    }

    async fn delete_topic(&self, name: &str) -> bool {
        let results = match self.admin.delete_topics(&[name], &self.options()).await {
            Ok(results) => results,
            Err(e) => {
                error!(topic = %name, error = %e, "failed to delete topic");
                return false;
            }
        };

        results.into_iter().all(|result| match result {
            Ok(name) => {
                info!(topic = %name, "deleted topic");
                true
            }
            Err((name, RDKafkaErrorCode::UnknownTopicOrPartition)) => {
                warn!(topic = %name, "topic does not exist");
                false
            }
            Err((name, code)) => {
                error!(topic = %name, error = %code, "failed to delete topic");
                false
            }
        })
    }
}

impl Debug for KafkaTopicManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaTopicManager")
            .field("admin", &"...")
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}
