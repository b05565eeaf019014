use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use rdkafka::ClientConfig;

use super::topic::CompressionType;
use crate::config::validate_host_list;
use crate::{ConfigError, Parser, Result, Sensitive, Validate, WrapErr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SecurityProtocol {
    Plaintext,
    Ssl,
    SaslPlaintext,
    SaslSsl,
}

impl SecurityProtocol {
    pub fn uses_sasl(self) -> bool {
        matches!(self, Self::SaslPlaintext | Self::SaslSsl)
    }

    pub fn uses_tls(self) -> bool {
        matches!(self, Self::Ssl | Self::SaslSsl)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum SaslMechanism {
    #[strum(serialize = "PLAIN")]
    Plain,
    #[strum(serialize = "SCRAM-SHA-256")]
    ScramSha256,
    #[strum(serialize = "SCRAM-SHA-512")]
    ScramSha512,
    #[strum(serialize = "OAUTHBEARER")]
    OauthBearer,
}

/// Broker connection and security settings shared by producers, consumers and the
/// admin client.
#[derive(Debug, Clone, Parser)]
pub struct KafkaConfig {
    #[clap(
        long = "kafka-bootstrap-servers",
        env = "KAFKA_BOOTSTRAP_SERVERS",
        default_value = "localhost:9092"
    )]
    pub kafka_bootstrap_servers: String,

    #[clap(
        long = "kafka-security-protocol",
        env = "KAFKA_SECURITY_PROTOCOL",
        default_value = "plaintext"
    )]
    pub kafka_security_protocol: SecurityProtocol,

    #[clap(long = "kafka-sasl-mechanism", env = "KAFKA_SASL_MECHANISM")]
    pub kafka_sasl_mechanism: Option<SaslMechanism>,

    #[clap(long = "kafka-sasl-username", env = "KAFKA_SASL_USERNAME")]
    pub kafka_sasl_username: Option<String>,

    #[clap(long = "kafka-sasl-password", env = "KAFKA_SASL_PASSWORD")]
    pub kafka_sasl_password: Option<Sensitive<String>>,

    /// Base64 encoded PEM client key.
    #[clap(long = "kafka-key", env = "KAFKA_KEY")]
    pub kafka_key: Option<Sensitive<String>>,

    /// Base64 encoded PEM client certificate.
    #[clap(long = "kafka-cert", env = "KAFKA_CERT")]
    pub kafka_cert: Option<Sensitive<String>>,

    /// Base64 encoded PEM certificate authority.
    #[clap(long = "kafka-ca", env = "KAFKA_CA")]
    pub kafka_ca: Option<Sensitive<String>>,

    #[clap(
        long = "kafka-health-check-topic",
        env = "KAFKA_HEALTH_CHECK_TOPIC",
        default_value = "construction.projects"
    )]
    pub kafka_health_check_topic: String,

    #[clap(
        long = "kafka-admin-timeout-ms",
        env = "KAFKA_ADMIN_TIMEOUT_MS",
        default_value = "30000"
    )]
    pub kafka_admin_timeout_ms: u64,
}

impl KafkaConfig {
    /// A plaintext configuration pointing at `bootstrap_servers`.
    pub fn plaintext(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            kafka_bootstrap_servers: bootstrap_servers.into(),
            kafka_security_protocol: SecurityProtocol::Plaintext,
            kafka_sasl_mechanism: None,
            kafka_sasl_username: None,
            kafka_sasl_password: None,
            kafka_key: None,
            kafka_cert: None,
            kafka_ca: None,
            kafka_health_check_topic: "construction.projects".to_string(),
            kafka_admin_timeout_ms: 30_000,
        }
    }

    pub fn admin_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka_admin_timeout_ms)
    }

    /// Base librdkafka configuration with connection and security settings applied.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.kafka_bootstrap_servers)
            .set(
                "security.protocol",
                self.kafka_security_protocol.to_string(),
            );

        if self.kafka_security_protocol.uses_sasl() {
            if let Some(mechanism) = self.kafka_sasl_mechanism {
                client_config.set("sasl.mechanism", mechanism.to_string());
            }
            if let Some(username) = &self.kafka_sasl_username {
                client_config.set("sasl.username", username);
            }
            if let Some(password) = &self.kafka_sasl_password {
                client_config.set("sasl.password", password.expose());
            }
        }

        if let (Some(key), Some(certificate)) = (&self.kafka_key, &self.kafka_cert) {
            client_config
                .set("ssl.key.pem", pem_string_from_base64(key)?.expose())
                .set(
                    "ssl.certificate.pem",
                    pem_string_from_base64(certificate)?.expose(),
                );
        }
        if let Some(ca) = &self.kafka_ca {
            client_config.set("ssl.ca.pem", pem_string_from_base64(ca)?.expose());
        }

        Ok(client_config)
    }
}

impl Validate for KafkaConfig {
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        validate_host_list("kafka-bootstrap-servers", &self.kafka_bootstrap_servers)?;

        if self.kafka_security_protocol.uses_sasl() {
            if self.kafka_sasl_mechanism.is_none() {
                return Err(ConfigError::Missing("kafka-sasl-mechanism"));
            }
            if self.kafka_sasl_username.is_none() {
                return Err(ConfigError::Missing("kafka-sasl-username"));
            }
            if self.kafka_sasl_password.is_none() {
                return Err(ConfigError::Missing("kafka-sasl-password"));
            }
        }

        match (&self.kafka_key, &self.kafka_cert) {
            (Some(_), None) => return Err(ConfigError::Missing("kafka-cert")),
            (None, Some(_)) => return Err(ConfigError::Missing("kafka-key")),
            _ => {}
        }

        let pem_settings = [
            ("kafka-key", &self.kafka_key),
            ("kafka-cert", &self.kafka_cert),
            ("kafka-ca", &self.kafka_ca),
        ];
        for (setting, value) in pem_settings {
            if let Some(value) = value {
                if !self.kafka_security_protocol.uses_tls() {
                    return Err(ConfigError::invalid(
                        setting,
                        format!(
                            "TLS material is ignored by security protocol {}",
                            self.kafka_security_protocol
                        ),
                    ));
                }
                pem_string_from_base64(value)
                    .map_err(|e| ConfigError::invalid(setting, e.to_string()))?;
            }
        }

        if self.kafka_health_check_topic.is_empty() {
            return Err(ConfigError::Missing("kafka-health-check-topic"));
        }
        if self.kafka_admin_timeout_ms == 0 {
            return Err(ConfigError::invalid("kafka-admin-timeout-ms", "must be positive"));
        }

        Ok(())
    }
}

fn pem_string_from_base64(base64: &Sensitive<String>) -> Result<Sensitive<String>> {
    let pem_bytes = general_purpose::STANDARD
        .decode(base64.expose())
        .wrap_err("PEM material is not valid base64")?;

    let pem_text = String::from_utf8(pem_bytes).wrap_err("PEM material is not UTF-8")?;
    Ok(Sensitive::from(pem_text))
}

/// Producer tuning. Acknowledgement waits longer than `producer-send-timeout-ms` are
/// reported as unacknowledged sends.
#[derive(Debug, Clone, Parser)]
pub struct ProducerConfig {
    #[clap(long = "producer-acks", env = "PRODUCER_ACKS", default_value = "all")]
    pub producer_acks: String,

    #[clap(long = "producer-retries", env = "PRODUCER_RETRIES", default_value = "3")]
    pub producer_retries: u32,

    #[clap(
        long = "producer-compression",
        env = "PRODUCER_COMPRESSION",
        default_value = "gzip"
    )]
    pub producer_compression: CompressionType,

    #[clap(long = "producer-linger-ms", env = "PRODUCER_LINGER_MS", default_value = "5")]
    pub producer_linger_ms: u64,

    #[clap(
        long = "producer-message-timeout-ms",
        env = "PRODUCER_MESSAGE_TIMEOUT_MS",
        default_value = "30000"
    )]
    pub producer_message_timeout_ms: u64,

    #[clap(
        long = "producer-send-timeout-ms",
        env = "PRODUCER_SEND_TIMEOUT_MS",
        default_value = "10000"
    )]
    pub producer_send_timeout_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            producer_acks: "all".to_string(),
            producer_retries: 3,
            producer_compression: CompressionType::Gzip,
            producer_linger_ms: 5,
            producer_message_timeout_ms: 30_000,
            producer_send_timeout_ms: 10_000,
        }
    }
}

impl ProducerConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.producer_send_timeout_ms)
    }

    pub fn apply(&self, client_config: &mut ClientConfig) {
        client_config
            .set("acks", &self.producer_acks)
            .set("retries", self.producer_retries.to_string())
            .set("compression.type", self.producer_compression.to_string())
            .set("linger.ms", self.producer_linger_ms.to_string())
            .set(
                "message.timeout.ms",
                self.producer_message_timeout_ms.to_string(),
            );
    }
}

impl Validate for ProducerConfig {
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !matches!(self.producer_acks.as_str(), "all" | "-1" | "0" | "1") {
            return Err(ConfigError::invalid(
                "producer-acks",
                format!("`{}` is not one of all, -1, 0, 1", self.producer_acks),
            ));
        }
        if self.producer_message_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "producer-message-timeout-ms",
                "must be positive",
            ));
        }
        if self.producer_send_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "producer-send-timeout-ms",
                "must be positive",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Parser)]
pub struct ConsumerConfig {
    #[clap(
        long = "consumer-group-id",
        env = "CONSUMER_GROUP_ID",
        default_value = "precon-stream"
    )]
    pub consumer_group_id: String,

    #[clap(
        long = "consumer-auto-offset-reset",
        env = "CONSUMER_AUTO_OFFSET_RESET",
        default_value = "earliest"
    )]
    pub consumer_auto_offset_reset: String,

    #[clap(
        long = "consumer-max-poll-records",
        env = "CONSUMER_MAX_POLL_RECORDS",
        default_value = "500"
    )]
    pub consumer_max_poll_records: usize,

    #[clap(
        long = "consumer-poll-timeout-ms",
        env = "CONSUMER_POLL_TIMEOUT_MS",
        default_value = "1000"
    )]
    pub consumer_poll_timeout_ms: u64,

    #[clap(
        long = "consumer-session-timeout-ms",
        env = "CONSUMER_SESSION_TIMEOUT_MS",
        default_value = "30000"
    )]
    pub consumer_session_timeout_ms: u64,
}

impl ConsumerConfig {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            consumer_group_id: group_id.into(),
            consumer_auto_offset_reset: "earliest".to_string(),
            consumer_max_poll_records: 500,
            consumer_poll_timeout_ms: 1_000,
            consumer_session_timeout_ms: 30_000,
        }
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.consumer_poll_timeout_ms)
    }

    /// Offsets are never committed automatically, the consumer loop commits them after
    /// each dispatched batch.
    pub fn apply(&self, client_config: &mut ClientConfig) {
        client_config
            .set("group.id", &self.consumer_group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.consumer_auto_offset_reset)
            .set(
                "session.timeout.ms",
                self.consumer_session_timeout_ms.to_string(),
            );
    }
}

impl Validate for ConsumerConfig {
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.consumer_group_id.trim().is_empty() {
            return Err(ConfigError::Missing("consumer-group-id"));
        }
        if !matches!(
            self.consumer_auto_offset_reset.as_str(),
            "earliest" | "latest"
        ) {
            return Err(ConfigError::invalid(
                "consumer-auto-offset-reset",
                "must be earliest or latest",
            ));
        }
        if self.consumer_max_poll_records == 0 {
            return Err(ConfigError::invalid(
                "consumer-max-poll-records",
                "must be positive",
            ));
        }
        if self.consumer_poll_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "consumer-poll-timeout-ms",
                "must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(text: &str) -> Option<Sensitive<String>> {
        Some(Sensitive::new(general_purpose::STANDARD.encode(text)))
    }

    #[test]
    fn plaintext_config_is_valid() {
        let config = KafkaConfig::plaintext("localhost:9092");
        assert_eq!(config.validate(), Ok(()));

        let client_config = config.client_config().unwrap();
        assert_eq!(client_config.get("bootstrap.servers"), Some("localhost:9092"));
        assert_eq!(client_config.get("security.protocol"), Some("plaintext"));
        assert_eq!(client_config.get("sasl.username"), None);
    }

    #[test]
    fn sasl_requires_credentials() {
        let mut config = KafkaConfig::plaintext("broker:9093");
        config.kafka_security_protocol = SecurityProtocol::SaslSsl;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Missing("kafka-sasl-mechanism"))
        );

        config.kafka_sasl_mechanism = Some(SaslMechanism::ScramSha512);
        config.kafka_sasl_username = Some("precon".to_string());
        assert_eq!(
            config.validate(),
            Err(ConfigError::Missing("kafka-sasl-password"))
        );

        config.kafka_sasl_password = Some(Sensitive::new("secret".to_string()));
        assert_eq!(config.validate(), Ok(()));

        let client_config = config.client_config().unwrap();
        assert_eq!(client_config.get("security.protocol"), Some("sasl_ssl"));
        assert_eq!(client_config.get("sasl.mechanism"), Some("SCRAM-SHA-512"));
        assert_eq!(client_config.get("sasl.password"), Some("secret"));
    }

    #[test]
    fn tls_material_is_decoded_and_checked() {
        let mut config = KafkaConfig::plaintext("broker:9093");
        config.kafka_ca = encoded("-----BEGIN CERTIFICATE-----");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                setting: "kafka-ca",
                ..
            })
        ));

        config.kafka_security_protocol = SecurityProtocol::Ssl;
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(
            config.client_config().unwrap().get("ssl.ca.pem"),
            Some("-----BEGIN CERTIFICATE-----")
        );

        config.kafka_key = encoded("key");
        assert_eq!(config.validate(), Err(ConfigError::Missing("kafka-cert")));

        config.kafka_cert = Some(Sensitive::new("not base64!".to_string()));
        assert!(config.validate().is_err());
    }

    #[test]
    fn producer_settings_are_applied() {
        let producer = ProducerConfig::default();
        assert_eq!(producer.validate(), Ok(()));

        let mut client_config = ClientConfig::new();
        producer.apply(&mut client_config);
        assert_eq!(client_config.get("acks"), Some("all"));
        assert_eq!(client_config.get("compression.type"), Some("gzip"));
        assert_eq!(client_config.get("message.timeout.ms"), Some("30000"));

        let invalid = ProducerConfig {
            producer_acks: "most".to_string(),
            ..ProducerConfig::default()
        };
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn consumer_never_auto_commits() {
        let consumer = ConsumerConfig::new("risk-engine");
        assert_eq!(consumer.validate(), Ok(()));

        let mut client_config = ClientConfig::new();
        consumer.apply(&mut client_config);
        assert_eq!(client_config.get("group.id"), Some("risk-engine"));
        assert_eq!(client_config.get("enable.auto.commit"), Some("false"));

        assert!(ConsumerConfig::new(" ").validate().is_err());
    }
}
