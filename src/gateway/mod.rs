//! JSON HTTP front end: publish events, trigger procurement syncs, report health.
use std::{
    collections::HashMap,
    fmt::{Debug, Formatter},
    future::Future,
    net::SocketAddr,
    sync::Arc,
};

use axum::{
    body::Body,
    http::Request,
    routing::{get, post},
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::health_status::HealthCheck;
use crate::sync::ProcurementSource;
use crate::{info, ConfigError, Parser, Result, StreamService, Validate, WrapErr};

mod error;
mod handlers;

pub use error::HttpError;
pub use handlers::stream_kind;

#[derive(Debug, Clone, Parser)]
pub struct GatewayConfig {
    #[clap(
        long = "http-listen-addr",
        env = "HTTP_LISTEN_ADDR",
        default_value = "0.0.0.0:8080"
    )]
    pub http_listen_addr: SocketAddr,
}

impl Validate for GatewayConfig {
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.http_listen_addr.port() == 0 {
            return Err(ConfigError::invalid("http-listen-addr", "port must be set"));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub streams: Arc<StreamService>,
    pub sources: Arc<HashMap<&'static str, Arc<dyn ProcurementSource>>>,
    pub health: HealthCheck,
}

impl AppState {
    pub fn new(streams: Arc<StreamService>) -> Self {
        Self {
            streams,
            sources: Arc::default(),
            health: HealthCheck::default(),
        }
    }

    /// Registers a sync source under its own name. Must be called before the state is
    /// shared.
    pub fn with_source(mut self, source: Arc<dyn ProcurementSource>) -> Self {
        let mut sources = (*self.sources).clone();
        sources.insert(source.name(), source);
        self.sources = Arc::new(sources);
        self
    }

    pub fn with_health_check(mut self, health: HealthCheck) -> Self {
        self.health = health;
        self
    }
}

impl Debug for AppState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("streams", &self.streams)
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .field("health", &self.health)
            .finish()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/stream/:kind", post(handlers::stream_event))
        .route("/api/sync/:source/:entity", post(handlers::sync))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default();

                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id
                )
            }),
        )
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Serves `router` on `addr` until `shutdown` resolves, then drains open connections.
pub async fn serve(
    addr: SocketAddr,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let server = axum::Server::try_bind(&addr).wrap_err_with(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "http gateway listening");

    server
        .serve(router.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .wrap_err("HTTP gateway failed")
}
