use std::{
    fmt::Display,
    future::Future,
    time::{Duration, Instant},
};

use eyre::Error;
use serde::Serialize;
use tokio::time::timeout;

#[derive(Debug, Serialize)]
pub struct HealthStatusReport {
    pub component: String,
    #[serde(flatten)]
    pub status: HealthStatus,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Offline { error: String },
}

impl Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Offline { error: _ } => write!(f, "offline"),
        }
    }
}

/// Thresholds for a health probe: slower than `degraded_after` is degraded, slower than
/// `timeout` (or failing) is offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthCheck {
    pub timeout: Duration,
    pub degraded_after: Duration,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2_000),
            degraded_after: Duration::from_millis(500),
        }
    }
}

impl HealthCheck {
    pub async fn run<F>(&self, component: impl Into<String>, probe: F) -> HealthStatusReport
    where
        F: Future<Output = Result<(), Error>>,
    {
        let start = Instant::now();

        let status = match timeout(self.timeout, probe).await {
            Ok(Ok(())) if start.elapsed() > self.degraded_after => HealthStatus::Degraded,
            Ok(Ok(())) => HealthStatus::Healthy,
            Ok(Err(e)) => HealthStatus::Offline {
                error: e.to_string(),
            },
            Err(e) => HealthStatus::Offline {
                error: e.to_string(),
            },
        };

        HealthStatusReport {
            component: component.into(),
            status,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl HealthStatusReport {
    pub fn is_available(&self) -> bool {
        !matches!(self.status, HealthStatus::Offline { .. })
    }
}
