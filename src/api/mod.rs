//! Clients for the third-party procurement APIs the platform synchronises from.
//!
//! Every client shares [`ApiClient`]: authenticated JSON requests with a request timeout
//! and bounded exponential backoff on rate limiting and transient transport failures.
mod client;
mod error;
mod greentree;
mod procurepro;
mod retry;

pub use client::{ApiClient, ApiClientSettings, ApiConfig, Auth, Page};
pub use error::ApiError;
pub use greentree::{GreentreeClient, GreentreeConfig, API_KEY_HEADER};
pub use procurepro::{ProcureProClient, ProcureProConfig};
pub use retry::{is_retryable_status, RetryMiddleware, RetryPolicy};
