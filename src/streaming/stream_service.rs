use std::{collections::HashMap, fmt::Debug, sync::Arc, time::Duration};

use serde_json::Value;

use super::{Message, StreamingClient, TopicAdmin, TopicConfig};
use crate::timeable::Timeable;
use crate::{error, info, warn, Result};

pub const SOURCE_HEADER_VALUE: &str = "precon-stream";

/// The domain events published by the platform. Each kind has a fixed topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum StreamKind {
    Project,
    Supplier,
    Risk,
    MlPrediction,
}

impl StreamKind {
    pub fn topic(self) -> &'static str {
        match self {
            Self::Project => "construction.projects",
            Self::Supplier => "construction.suppliers",
            Self::Risk => "construction.risks",
            Self::MlPrediction => "construction.ml-predictions",
        }
    }

    pub fn key_prefix(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Supplier => "supplier",
            Self::Risk => "risk",
            Self::MlPrediction => "prediction",
        }
    }

    pub fn event_type(self) -> &'static str {
        match self {
            Self::Project => "project_data",
            Self::Supplier => "supplier_data",
            Self::Risk => "risk_data",
            Self::MlPrediction => "ml_prediction",
        }
    }

    /// `<prefix>_<id>`, where the id is the payload's `id` field. Missing, null or
    /// non-scalar ids become `unknown`.
    pub fn key_for(self, data: &Value) -> String {
        let id = match data.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => "unknown".to_string(),
        };
        format!("{}_{}", self.key_prefix(), id)
    }

    pub fn topic_config(self) -> TopicConfig {
        let topic = TopicConfig::new(self.topic());
        match self {
            Self::Project | Self::Supplier => topic.with_partitions(3),
            Self::Risk => topic
                .with_partitions(3)
                .with_retention(Duration::from_secs(30 * 24 * 60 * 60)),
            Self::MlPrediction => topic,
        }
    }

    pub fn all() -> impl Iterator<Item = StreamKind> {
        <Self as strum::IntoEnumIterator>::iter()
    }
}

/// Publishes domain events to their topics.
///
/// Construct it once at startup and share it (it is `Send + Sync`); the topics it
/// publishes to are created on construction if missing.
pub struct StreamService {
    producer: Arc<dyn StreamingClient>,
    topics: Arc<dyn TopicAdmin>,
    send_timeout: Duration,
}

impl StreamService {
    pub async fn new(
        producer: Arc<dyn StreamingClient>,
        topics: Arc<dyn TopicAdmin>,
        send_timeout: Duration,
    ) -> Self {
        let service = Self {
            producer,
            topics,
            send_timeout,
        };
        service.ensure_topics().await;
        service
    }

    /// Creates the missing stream topics and returns how many were created. Creation
    /// failures are only warnings: the topic may have been created concurrently or be
    /// managed outside this service.
    pub async fn ensure_topics(&self) -> usize {
        let existing = self.topics.list_topics().await;
        let mut created = 0;

        for kind in StreamKind::all() {
            let spec = kind.topic_config();
            if existing.contains(&spec.name) {
                continue;
            }

            if self.topics.create_topic(&spec).await {
                created += 1;
            } else {
                warn!(topic = %spec.name, "could not create stream topic, assuming it is managed elsewhere");
            }
        }

        info!(created, "stream topics ready");
        created
    }

    pub async fn stream_project_data(&self, project: &Value) -> bool {
        self.stream(StreamKind::Project, project).await
    }

    pub async fn stream_supplier_data(&self, supplier: &Value) -> bool {
        self.stream(StreamKind::Supplier, supplier).await
    }

    pub async fn stream_risk_data(&self, risk: &Value) -> bool {
        self.stream(StreamKind::Risk, risk).await
    }

    pub async fn stream_ml_prediction(&self, prediction: &Value) -> bool {
        self.stream(StreamKind::MlPrediction, prediction).await
    }

    /// Publishes `data` to the topic of `kind` and waits for the acknowledgement.
    /// Failures are logged and reported as `false`.
    pub async fn stream(&self, kind: StreamKind, data: &Value) -> bool {
        let message = match build_message(kind, data) {
            Ok(message) => message,
            Err(e) => {
                error!(kind = %kind, error = ?e, "failed to build message");
                return false;
            }
        };
        let message_id = message.id.clone();

        match self
            .producer
            .send_sync(message, self.send_timeout)
            .time_as(format!("stream_{kind}"))
            .await
        {
            Ok(true) => {
                info!(kind = %kind, message_id = %message_id, "streamed event");
                true
            }
            Ok(false) => {
                warn!(kind = %kind, message_id = %message_id, "event was not acknowledged in time");
                false
            }
            Err(e) => {
                error!(kind = %kind, message_id = %message_id, error = ?e, "failed to stream event");
                false
            }
        }
    }

    pub async fn health_check(&self) -> Result<()> {
        self.producer.health_check().await
    }

    /// Flushes in-flight messages. Call before the process exits.
    pub fn shutdown(&self, timeout: Duration) -> Result<()> {
        info!(?timeout, "flushing stream producer");
        self.producer.flush(timeout)
    }
}

fn build_message(kind: StreamKind, data: &Value) -> Result<Message> {
    let headers = HashMap::from([
        ("event_type".to_string(), kind.event_type().to_string()),
        ("source".to_string(), SOURCE_HEADER_VALUE.to_string()),
    ]);
    let message = Message::new(kind.topic(), kind.key_for(data), data, headers)?;
    let message_id = message.id.clone();

    Ok(message.with_header("message_id", message_id))
}

impl Debug for StreamService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamService")
            .field("send_timeout", &self.send_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn keys_use_the_payload_id() {
        assert_eq!(StreamKind::Project.key_for(&json!({"id": 17})), "project_17");
        assert_eq!(
            StreamKind::Supplier.key_for(&json!({"id": "SUP-9"})),
            "supplier_SUP-9"
        );
        assert_eq!(
            StreamKind::MlPrediction.key_for(&json!({"id": "m-1", "score": 0.3})),
            "prediction_m-1"
        );
    }

    #[test]
    fn missing_ids_become_unknown() {
        assert_eq!(StreamKind::Project.key_for(&json!({})), "project_unknown");
        assert_eq!(
            StreamKind::Project.key_for(&json!({"id": null})),
            "project_unknown"
        );
        assert_eq!(StreamKind::Risk.key_for(&json!({"id": ""})), "risk_unknown");
        assert_eq!(
            StreamKind::Risk.key_for(&json!({"id": {"nested": 1}})),
            "risk_unknown"
        );
    }

    #[test]
    fn every_kind_has_a_distinct_valid_topic() {
        let topics: std::collections::HashSet<_> = StreamKind::all().map(StreamKind::topic).collect();
        assert_eq!(topics.len(), 4);

        for kind in StreamKind::all() {
            assert_eq!(kind.topic_config().validate(), Ok(()));
        }
    }

    #[test]
    fn messages_carry_event_headers() {
        let message = build_message(StreamKind::Risk, &json!({"id": 3, "level": "high"})).unwrap();

        assert_eq!(message.topic, "construction.risks");
        assert_eq!(message.key, "risk_3");
        assert_eq!(message.headers["event_type"], "risk_data");
        assert_eq!(message.headers["source"], SOURCE_HEADER_VALUE);
        assert_eq!(message.headers["message_id"], message.id);
        assert!(message.id.starts_with("construction.risks_risk_3_"));
    }
}
