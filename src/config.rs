use crate::Error;

/// Configuration problems detected at startup. Every variant is fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid value for `{setting}`: {reason}")]
    Invalid {
        setting: &'static str,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(setting: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            setting,
            reason: reason.into(),
        }
    }
}

/// Checks a parsed configuration section before anything is built from it.
pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Checks a comma-separated `host:port` list.
pub fn validate_host_list(setting: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(setting));
    }

    for server in value.split(',').map(str::trim) {
        let (host, port) = server
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::invalid(setting, format!("`{server}` has no port")))?;
        if host.is_empty() {
            return Err(ConfigError::invalid(setting, format!("`{server}` has no host")));
        }
        port.parse::<u16>()
            .map_err(|_| ConfigError::invalid(setting, format!("`{server}` has an invalid port")))?;
    }

    Ok(())
}

/// Checks that a URL has an http(s) scheme and a host.
pub fn validate_http_url(setting: &'static str, value: &str) -> Result<(), ConfigError> {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .ok_or_else(|| ConfigError::invalid(setting, "expected an http(s) URL"))?;

    if rest.split('/').next().unwrap_or_default().is_empty() {
        return Err(ConfigError::invalid(setting, "URL has no host"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_list_accepts_multiple_brokers() {
        assert_eq!(
            validate_host_list("kafka-bootstrap-servers", "localhost:9092, kafka-2:29092"),
            Ok(())
        );
    }

    #[test]
    fn host_list_rejects_missing_port_and_empty_value() {
        assert_eq!(
            validate_host_list("kafka-bootstrap-servers", ""),
            Err(ConfigError::Missing("kafka-bootstrap-servers"))
        );
        assert!(matches!(
            validate_host_list("kafka-bootstrap-servers", "localhost"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            validate_host_list("kafka-bootstrap-servers", "localhost:http"),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn http_url_requires_scheme_and_host() {
        assert_eq!(validate_http_url("url", "https://api.example.com/v1"), Ok(()));
        assert!(validate_http_url("url", "api.example.com").is_err());
        assert!(validate_http_url("url", "http:///path").is_err());
    }
}
