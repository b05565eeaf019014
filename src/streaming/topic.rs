use std::time::Duration;

use crate::ConfigError;

/// Seven days.
pub const DEFAULT_RETENTION_MS: i64 = 604_800_000;

const MAX_TOPIC_NAME_LEN: usize = 249;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum CleanupPolicy {
    #[strum(serialize = "delete")]
    Delete,
    #[strum(serialize = "compact")]
    Compact,
    #[strum(serialize = "compact,delete")]
    CompactDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CompressionType {
    None,
    Gzip,
    Snappy,
    Lz4,
    Zstd,
}

/// Everything needed to create a topic. The name is the unique key within the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    pub name: String,
    pub num_partitions: i32,
    pub replication_factor: i32,
    pub retention_ms: i64,
    pub cleanup_policy: CleanupPolicy,
    pub compression_type: CompressionType,
}

impl TopicConfig {
    /// A single-partition, single-replica topic keeping messages for seven days, gzip
    /// compressed and cleaned up by deletion.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            num_partitions: 1,
            replication_factor: 1,
            retention_ms: DEFAULT_RETENTION_MS,
            cleanup_policy: CleanupPolicy::Delete,
            compression_type: CompressionType::Gzip,
        }
    }

    pub fn with_partitions(mut self, num_partitions: i32) -> Self {
        self.num_partitions = num_partitions;
        self
    }

    pub fn with_replication_factor(mut self, replication_factor: i32) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention_ms = i64::try_from(retention.as_millis()).unwrap_or(i64::MAX);
        self
    }

    pub fn with_cleanup_policy(mut self, cleanup_policy: CleanupPolicy) -> Self {
        self.cleanup_policy = cleanup_policy;
        self
    }

    pub fn with_compression(mut self, compression_type: CompressionType) -> Self {
        self.compression_type = compression_type;
        self
    }

    /// Topic-level broker settings, as passed to the admin API.
    pub fn settings(&self) -> Vec<(&'static str, String)> {
        vec![
            ("retention.ms", self.retention_ms.to_string()),
            ("cleanup.policy", self.cleanup_policy.to_string()),
            ("compression.type", self.compression_type.to_string()),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Missing("topic name"));
        }
        if self.name.len() > MAX_TOPIC_NAME_LEN {
            return Err(ConfigError::invalid(
                "topic name",
                format!("longer than {MAX_TOPIC_NAME_LEN} characters"),
            ));
        }
        if self.name == "." || self.name == ".." {
            return Err(ConfigError::invalid("topic name", "`.` and `..` are reserved"));
        }
        if let Some(c) = self
            .name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(ConfigError::invalid(
                "topic name",
                format!("`{c}` is not allowed in `{}`", self.name),
            ));
        }
        if self.num_partitions < 1 {
            return Err(ConfigError::invalid("num_partitions", "must be at least 1"));
        }
        if self.replication_factor < 1 {
            return Err(ConfigError::invalid("replication_factor", "must be at least 1"));
        }
        if self.retention_ms < -1 {
            return Err(ConfigError::invalid(
                "retention_ms",
                "must be -1 (unlimited) or positive",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_topic_uses_defaults() {
        let topic = TopicConfig::new("construction.projects");

        assert_eq!(topic.num_partitions, 1);
        assert_eq!(topic.replication_factor, 1);
        assert_eq!(topic.retention_ms, 604_800_000);
        assert_eq!(topic.cleanup_policy.to_string(), "delete");
        assert_eq!(topic.compression_type.to_string(), "gzip");
    }

    #[test]
    fn settings_use_broker_names() {
        let topic = TopicConfig::new("construction.risks")
            .with_retention(Duration::from_secs(60))
            .with_cleanup_policy(CleanupPolicy::CompactDelete)
            .with_compression(CompressionType::Zstd);

        assert_eq!(
            topic.settings(),
            vec![
                ("retention.ms", "60000".to_string()),
                ("cleanup.policy", "compact,delete".to_string()),
                ("compression.type", "zstd".to_string()),
            ]
        );
    }

    #[test]
    fn policies_parse_from_broker_names() {
        assert_eq!(
            "compact,delete".parse::<CleanupPolicy>().unwrap(),
            CleanupPolicy::CompactDelete
        );
        assert_eq!("LZ4".parse::<CompressionType>().unwrap(), CompressionType::Lz4);
    }

    #[test]
    fn rejects_invalid_topics() {
        assert!(TopicConfig::new("construction.projects").validate().is_ok());
        assert_eq!(
            TopicConfig::new("").validate(),
            Err(ConfigError::Missing("topic name"))
        );
        assert!(TopicConfig::new("projects/2024").validate().is_err());
        assert!(TopicConfig::new("..").validate().is_err());
        assert!(TopicConfig::new("a".repeat(250)).validate().is_err());
        assert!(TopicConfig::new("p").with_partitions(0).validate().is_err());
        assert!(TopicConfig::new("p")
            .with_replication_factor(0)
            .validate()
            .is_err());
    }
}
