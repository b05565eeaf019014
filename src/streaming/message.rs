use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::{Deserialize, Result, Serialize, WrapErr};

/// A keyed message ready to be published. The payload is the JSON text of the value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Message {
    pub id: String,
    pub topic: String,
    pub key: String,
    pub payload: String,
    pub headers: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new<V>(
        topic: impl Into<String>,
        key: impl Into<String>,
        value: &V,
        headers: HashMap<String, String>,
    ) -> Result<Self>
    where
        V: Serialize + ?Sized,
    {
        Self::at(topic, key, value, headers, Utc::now())
    }

    /// Same as [`Message::new`] with an explicit creation time.
    pub fn at<V>(
        topic: impl Into<String>,
        key: impl Into<String>,
        value: &V,
        headers: HashMap<String, String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self>
    where
        V: Serialize + ?Sized,
    {
        let topic = topic.into();
        let key = key.into();
        let payload = serde_json::to_string(value)
            .wrap_err_with(|| format!("Failed to serialize payload for {topic}/{key}"))?;

        Ok(Self {
            id: format!("{}_{}_{}", topic, key, timestamp.timestamp_millis()),
            topic,
            key,
            payload,
            headers,
            timestamp,
        })
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Decodes the payload back into a value.
    pub fn value<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.payload)
            .wrap_err_with(|| format!("Failed to decode payload of message {}", self.id))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn id_combines_topic_key_and_timestamp() {
        let timestamp = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let message = Message::at(
            "construction.projects",
            "project_42",
            &json!({"id": 42}),
            HashMap::new(),
            timestamp,
        )
        .unwrap();

        assert_eq!(message.id, "construction.projects_project_42_1700000000123");
        assert_eq!(message.payload, r#"{"id":42}"#);
        assert_eq!(message.timestamp, timestamp);
    }

    #[test]
    fn payload_decodes_to_original_value() {
        let value = json!({"id": "p-1", "budget": 1250000.5, "phases": ["design", "tender"]});
        let message = Message::new("construction.projects", "project_p-1", &value, HashMap::new())
            .unwrap()
            .with_header("event_type", "project_data");

        assert_eq!(message.value::<serde_json::Value>().unwrap(), value);
        assert_eq!(message.headers["event_type"], "project_data");
    }
}
