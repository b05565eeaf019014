use tracing_subscriber::fmt::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;

use crate::{async_trait, ConfigError, EnvironmentConfig, Feature, Parser, Result, Validate};

// -----------------------------------------------------------------------------
// Supported Formats
// -----------------------------------------------------------------------------
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TracingFormat {
    None,
    Hierarchical,
    Pretty,
    Json,
}

// -----------------------------------------------------------------------------
// Config
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Parser)]
pub struct TracingConfig {
    #[clap(
        long = "tracing-disable-opentelemetry",
        env = "TRACING_DISABLE_OPENTELEMETRY"
    )]
    pub disable_opentelemetry: bool,

    #[clap(
        long = "tracing-opentelemetry-endpoint",
        env = "TRACING_OPENTELEMETRY_ENDPOINT",
        default_value = "http://localhost:14268/api/traces"
    )]
    pub opentelemetry_endpoint: String,

    #[clap(
        long = "tracing-log-level",
        env = "TRACING_LOG_LEVEL",
        default_value = "info,precon_stream=debug,rdkafka=warn"
    )]
    pub log_level: String,

    #[clap(long = "tracing-format", env = "TRACING_FORMAT", default_value = "pretty")]
    pub format: TracingFormat,
}

impl Validate for TracingConfig {
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        EnvFilter::try_new(&self.log_level)
            .map_err(|e| ConfigError::invalid("tracing-log-level", e.to_string()))?;

        if !self.disable_opentelemetry {
            crate::config::validate_http_url(
                "tracing-opentelemetry-endpoint",
                &self.opentelemetry_endpoint,
            )?;
        }

        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Service
// -----------------------------------------------------------------------------
#[derive(Debug)]
pub struct Tracing;

#[async_trait]
impl Feature for Tracing {
    async fn init(service_name: &str, config: EnvironmentConfig) -> Result<Self> {
        let filter = EnvFilter::try_new(&config.tracing.log_level)?;

        let telemetry = if config.tracing.disable_opentelemetry {
            None
        } else {
            let tracer = opentelemetry_jaeger::new_collector_pipeline()
                .with_endpoint(&config.tracing.opentelemetry_endpoint)
                .with_service_name(service_name)
                .with_reqwest()
                .install_batch(opentelemetry::runtime::Tokio)?;
            Some(
                tracing_opentelemetry::layer()
                    .with_tracked_inactivity(false)
                    .with_tracer(tracer),
            )
        };

        // the registry cannot take layers conditionally, so every format is passed as an
        // Option and only the selected one is Some.
        // https://github.com/tokio-rs/tracing/issues/894
        let ansi = !config.core.no_color;
        let (layer_format_json, layer_format_pretty, layer_format_hierarchical) =
            match config.tracing.format {
                TracingFormat::None => (None, None, None),
                TracingFormat::Json => (
                    Some(
                        Layer::default()
                            .json()
                            .with_current_span(true)
                            .with_span_list(false)
                            .with_target(true),
                    ),
                    None,
                    None,
                ),
                TracingFormat::Pretty => (
                    None,
                    Some(
                        Layer::default()
                            .pretty()
                            .with_thread_names(true)
                            .with_target(true)
                            .with_file(true)
                            .with_line_number(true)
                            .with_ansi(ansi),
                    ),
                    None,
                ),
                TracingFormat::Hierarchical => (
                    None,
                    None,
                    Some(
                        HierarchicalLayer::new(2)
                            .with_targets(true)
                            .with_bracketed_fields(true)
                            .with_ansi(ansi),
                    ),
                ),
            };

        Registry::default()
            .with(filter)
            .with(telemetry)
            .with(layer_format_json)
            .with(layer_format_pretty)
            .with(layer_format_hierarchical)
            .try_init()?;

        tracing::debug!(format = %config.tracing.format, "started tracer");

        Ok(Self)
    }
}

impl Drop for Tracing {
    fn drop(&mut self) {
        tracing::debug!("stopping tracer");
        opentelemetry::global::shutdown_tracer_provider();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(log_level: &str, disable_opentelemetry: bool) -> TracingConfig {
        TracingConfig {
            disable_opentelemetry,
            opentelemetry_endpoint: "http://localhost:14268/api/traces".to_string(),
            log_level: log_level.to_string(),
            format: TracingFormat::Json,
        }
    }

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!("JSON".parse::<TracingFormat>().unwrap(), TracingFormat::Json);
        assert_eq!(
            "hierarchical".parse::<TracingFormat>().unwrap(),
            TracingFormat::Hierarchical
        );
        assert!("xml".parse::<TracingFormat>().is_err());
    }

    #[test]
    fn rejects_unparseable_log_level() {
        assert!(config("info,precon_stream=debug", true).validate().is_ok());
        assert!(config("precon_stream=loud", true).validate().is_err());
    }

    #[test]
    fn endpoint_only_checked_when_exporting() {
        let mut with_bad_endpoint = config("info", true);
        with_bad_endpoint.opentelemetry_endpoint = "not a url".to_string();
        assert!(with_bad_endpoint.validate().is_ok());

        with_bad_endpoint.disable_opentelemetry = false;
        assert!(with_bad_endpoint.validate().is_err());
    }
}
