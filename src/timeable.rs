use metrics::{describe_histogram, histogram, Unit};
use std::future::Future;
use tokio::time::Instant;

use once_cell::sync::OnceCell;

const DEFAULT_METRIC_NAME: &str = "operation_duration_ms";

static METRIC_NAME: OnceCell<String> = OnceCell::new();

/// Names and describes the duration histogram after the service, e.g.
/// `precon_stream_gateway_operation_duration_ms`. Later calls are ignored.
pub fn init(service_name: &str) {
    let metric_name = METRIC_NAME.get_or_init(|| {
        format!(
            "{}_{}",
            service_name.replace('-', "_"),
            DEFAULT_METRIC_NAME
        )
    });

    describe_histogram!(
        metric_name.clone(),
        Unit::Milliseconds,
        "Duration of stream publishes and other timed operations."
    );
}

pub fn metric_name() -> &'static str {
    METRIC_NAME
        .get()
        .map(String::as_str)
        .unwrap_or(DEFAULT_METRIC_NAME)
}

/// Tracks execution duration of futures.
#[crate::async_trait]
pub trait Timeable<T> {
    async fn time_as<S: Into<String> + Send>(self, operation: S) -> T;
}

/// Records the duration of any future in the operation duration histogram, labelled by
/// operation name.
#[crate::async_trait]
impl<Fut, Res> Timeable<Res> for Fut
where
    Fut: Future<Output = Res> + Send,
    Res: Send,
{
    async fn time_as<S: Into<String> + Send>(self, operation: S) -> Res {
        let operation = operation.into();
        let start = Instant::now();
        let result = self.await;

        histogram!(
            metric_name(),
            start.elapsed().as_secs_f64() * 1000.0,
            "operation" => operation
        );

        result
    }
}
