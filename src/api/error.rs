use std::time::Duration;

use crate::Error;

/// Failure of a call to a third-party API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limit exceeded after {retries} retries")]
    RateLimited {
        retries: u32,
        retry_after: Option<Duration>,
    },

    #[error("transport failure: {0}")]
    Transport(#[source] reqwest_middleware::Error),

    #[error("api responded {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("request timed out")]
    Timeout,

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Stable machine-readable identifier, used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication_failed",
            Self::RateLimited { .. } => "rate_limited",
            Self::Transport(_) => "transport_error",
            Self::Api { .. } => "api_error",
            Self::Malformed(_) => "malformed_response",
            Self::Timeout => "timeout",
            Self::Config(_) => "configuration_error",
        }
    }
}

impl From<reqwest_middleware::Error> for ApiError {
    fn from(e: reqwest_middleware::Error) -> Self {
        match e {
            reqwest_middleware::Error::Reqwest(e) if e.is_timeout() => Self::Timeout,
            e => Self::Transport(e),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        reqwest_middleware::Error::Reqwest(e).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            ApiError::RateLimited {
                retries: 3,
                retry_after: None
            }
            .code(),
            "rate_limited"
        );
        assert_eq!(ApiError::Authentication("missing key".into()).code(), "authentication_failed");
        assert_eq!(ApiError::Timeout.code(), "timeout");
        assert_eq!(
            ApiError::Api {
                status: 500,
                message: "boom".into()
            }
            .to_string(),
            "api responded 500: boom"
        );
    }
}
