//! Tails the project stream and logs every event.
//!
//! ```sh
//! KAFKA_BOOTSTRAP_SERVERS=localhost:9092 cargo run --example consume_projects
//! ```
use precon_stream::*;

#[derive(Debug, Clone, Parser)]
struct DemoConfig {
    #[clap(flatten)]
    kafka: KafkaConfig,

    #[clap(long = "group-id", env = "KAFKA_GROUP_ID", default_value = "precon-stream-demo")]
    group_id: String,
}

impl Validate for DemoConfig {
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.kafka.validate()
    }
}

#[precon_stream::main]
async fn main() -> Result<()> {
    let env = Config::<DemoConfig>::init("consume-projects").await?;
    let config = env.config.project;

    let topic = StreamKind::Project.topic();
    let mut consumer = KafkaConsumer::connect(&config.kafka, &ConsumerConfig::new(config.group_id), &[topic])?;

    consumer.register_callback(topic, |message: &ReceivedMessage| {
        info!(key = ?message.key, offset = message.offset, value = %message.value, "project event");
        Ok(())
    });

    let stop = consumer.stop_handle();
    task::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
    });

    consumer.start_consuming().await
}
