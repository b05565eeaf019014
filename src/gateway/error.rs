use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::api::ApiError;
use crate::{warn, Error};

/// Failure of a gateway request, rendered as `{ "error": ..., "code": ... }`.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("failed to publish to `{0}`")]
    PublishFailed(&'static str),

    #[error("upstream api failed: {0}")]
    Upstream(#[from] ApiError),
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PublishFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Upstream(ApiError::RateLimited { .. }) => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream(ApiError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::PublishFailed(_) => "publish_failed",
            Self::Upstream(e) => e.code(),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, code = self.code(), "request failed");
        }

        let body = Json(json!({ "error": self.to_string(), "code": self.code() }));
        let mut response = (status, body).into_response();

        if let Self::Upstream(ApiError::RateLimited {
            retry_after: Some(retry_after),
            ..
        }) = &self
        {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn upstream_errors_map_to_gateway_statuses() {
        let rate_limited = HttpError::from(ApiError::RateLimited {
            retries: 3,
            retry_after: Some(Duration::from_secs(30)),
        });
        assert_eq!(rate_limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(rate_limited.code(), "rate_limited");

        let response = rate_limited.into_response();
        assert_eq!(response.headers()[RETRY_AFTER], "30");

        assert_eq!(HttpError::from(ApiError::Timeout).status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            HttpError::from(ApiError::Authentication("bad key".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            HttpError::PublishFailed("construction.projects").status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
