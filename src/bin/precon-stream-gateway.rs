use std::{sync::Arc, time::Duration};

use precon_stream::api::{ApiConfig, GreentreeClient, GreentreeConfig, ProcureProClient, ProcureProConfig};
use precon_stream::gateway::{self, AppState, GatewayConfig};
use precon_stream::*;

const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Parser)]
struct GatewayServiceConfig {
    #[clap(flatten)]
    kafka: KafkaConfig,

    #[clap(flatten)]
    producer: ProducerConfig,

    #[clap(flatten)]
    api: ApiConfig,

    #[clap(flatten)]
    greentree: GreentreeConfig,

    #[clap(flatten)]
    procurepro: ProcureProConfig,

    #[clap(flatten)]
    gateway: GatewayConfig,
}

impl Validate for GatewayServiceConfig {
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.kafka.validate()?;
        self.producer.validate()?;
        self.api.validate()?;
        self.greentree.validate()?;
        self.procurepro.validate()?;
        self.gateway.validate()
    }
}

#[precon_stream::main]
async fn main() -> Result<()> {
    let env = Config::<GatewayServiceConfig>::init("precon-stream-gateway").await?;
    let config = &env.config.project;

    let producer = Arc::new(KafkaProducer::new(&config.kafka, &config.producer).await?);
    let topics = Arc::new(KafkaTopicManager::new(&config.kafka)?);
    let streams = Arc::new(StreamService::new(producer, topics, config.producer.send_timeout()).await);

    let mut state = AppState::new(streams.clone());
    if let Some(client) = GreentreeClient::from_config(&config.greentree, &config.api)? {
        state = state.with_source(Arc::new(client));
    }
    if let Some(client) = ProcureProClient::from_config(&config.procurepro, &config.api)? {
        state = state.with_source(Arc::new(client));
    }
    info!(sources = ?state.sources.keys().collect::<Vec<_>>(), "sync sources configured");

    gateway::serve(
        config.gateway.http_listen_addr,
        gateway::router(state),
        shutdown_signal(),
    )
    .await?;

    streams.shutdown(FLUSH_TIMEOUT)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            error!(error = ?e, "cannot listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
