use std::time::Duration;

use reqwest::{Request, Response, StatusCode};
use reqwest_middleware::{Middleware, Next};
use task_local_extensions::Extensions;

use crate::{async_trait, debug, warn};

/// Bounded retries with truncated exponential backoff: the wait before retry `n`
/// (zero based) is `base_delay * 2^n`, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self, retry: u32) -> Duration {
        2u32.checked_pow(retry)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Every wait this policy would go through, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|retry| self.delay(retry))
    }
}

/// Rate limiting and gateway errors, which are expected to clear up on their own.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retryable_error(error: &reqwest_middleware::Error) -> bool {
    match error {
        reqwest_middleware::Error::Reqwest(e) => e.is_connect() || e.is_timeout(),
        reqwest_middleware::Error::Middleware(_) => false,
    }
}

/// Retries transient failures according to a [`RetryPolicy`]. Once the retries are
/// exhausted the last response or error is handed back unchanged.
#[derive(Debug, Clone)]
pub struct RetryMiddleware {
    policy: RetryPolicy,
}

impl RetryMiddleware {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Middleware for RetryMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let mut retry = 0;

        loop {
            // streaming bodies cannot be replayed
            let Some(attempt) = req.try_clone() else {
                return next.run(req, extensions).await;
            };

            let outcome = next.clone().run(attempt, extensions).await;
            let retryable = match &outcome {
                Ok(response) => is_retryable_status(response.status()),
                Err(e) => is_retryable_error(e),
            };

            if !retryable {
                return outcome;
            }
            if retry >= self.policy.max_retries {
                debug!(url = %req.url(), retries = retry, "retries exhausted");
                return outcome;
            }

            let delay = self.policy.delay(retry);
            warn!(
                url = %req.url(),
                retry = retry + 1,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                status = ?outcome.as_ref().ok().map(Response::status),
                "transient failure, retrying"
            );
            drop(outcome);

            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}
