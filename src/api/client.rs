use std::{
    fmt::{Debug, Formatter},
    time::Duration,
};

use reqwest::{header::RETRY_AFTER, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{ApiError, RetryMiddleware, RetryPolicy};
use crate::config::validate_http_url;
use crate::{debug, warn, Deserialize, Parser, Sensitive};

const USER_AGENT: &str = concat!("precon-stream/", env!("CARGO_PKG_VERSION"));

/// Timeout and retry settings shared by every third-party API client.
#[derive(Debug, Clone, Parser)]
pub struct ApiConfig {
    #[clap(long = "api-timeout-ms", env = "API_TIMEOUT_MS", default_value = "30000")]
    pub api_timeout_ms: u64,

    #[clap(long = "api-max-retries", env = "API_MAX_RETRIES", default_value = "3")]
    pub api_max_retries: u32,

    #[clap(
        long = "api-backoff-base-ms",
        env = "API_BACKOFF_BASE_MS",
        default_value = "1000"
    )]
    pub api_backoff_base_ms: u64,

    #[clap(
        long = "api-backoff-max-ms",
        env = "API_BACKOFF_MAX_MS",
        default_value = "60000"
    )]
    pub api_backoff_max_ms: u64,
}

impl ApiConfig {
    pub fn settings(&self, base_url: impl Into<String>) -> ApiClientSettings {
        ApiClientSettings {
            base_url: base_url.into(),
            timeout: Duration::from_millis(self.api_timeout_ms),
            retry: RetryPolicy {
                max_retries: self.api_max_retries,
                base_delay: Duration::from_millis(self.api_backoff_base_ms),
                max_delay: Duration::from_millis(self.api_backoff_max_ms),
            },
        }
    }
}

impl crate::Validate for ApiConfig {
    fn validate(&self) -> Result<(), crate::ConfigError> {
        if self.api_timeout_ms == 0 {
            return Err(crate::ConfigError::invalid("api-timeout-ms", "must be positive"));
        }
        if self.api_backoff_base_ms > self.api_backoff_max_ms {
            return Err(crate::ConfigError::invalid(
                "api-backoff-base-ms",
                "must not exceed api-backoff-max-ms",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ApiClientSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone)]
pub enum Auth {
    None,
    ApiKey {
        header: &'static str,
        key: Sensitive<String>,
    },
    Bearer(Sensitive<String>),
}

impl Auth {
    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Auth::None => request,
            Auth::ApiKey { header, key } => request.header(*header, key.expose()),
            Auth::Bearer(token) => request.bearer_auth(token.expose()),
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            Auth::None => false,
            Auth::ApiKey { key, .. } => key.trim().is_empty(),
            Auth::Bearer(token) => token.trim().is_empty(),
        }
    }
}

/// One page of a list endpoint. Accepts a bare JSON array or a `{ "data": [...] }`
/// envelope with an optional `next_page`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Bare(Vec<Value>),
    Envelope {
        data: Vec<Value>,
        #[serde(default)]
        next_page: Option<u32>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub next_page: Option<u32>,
}

impl From<ListResponse> for Page {
    fn from(response: ListResponse) -> Self {
        match response {
            ListResponse::Bare(items) => Page {
                items,
                next_page: None,
            },
            ListResponse::Envelope { data, next_page } => Page {
                items: data,
                next_page,
            },
        }
    }
}

/// Authenticated JSON client for one third-party API, retrying transient failures.
#[derive(Clone)]
pub struct ApiClient {
    name: &'static str,
    http: ClientWithMiddleware,
    base_url: String,
    auth: Auth,
    retry: RetryPolicy,
}

impl ApiClient {
    /// Fails when the base URL or credentials are unusable, so misconfigured clients are
    /// caught at startup rather than on the first call.
    pub fn new(name: &'static str, settings: ApiClientSettings, auth: Auth) -> Result<Self, ApiError> {
        validate_http_url("base_url", &settings.base_url)
            .map_err(|e| ApiError::Config(format!("{name}: {e}")))?;
        if auth.is_blank() {
            return Err(ApiError::Authentication(format!("{name}: credentials are empty")));
        }

        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::Config(format!("{name}: {e}")))?;

        Ok(Self {
            name,
            http: ClientBuilder::new(client)
                .with(RetryMiddleware::new(settings.retry))
                .build(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            auth,
            retry: settings.retry,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let request = self.auth.apply(self.http.get(self.url(path)).query(query));

        debug!(api = self.name, path, "calling api");
        let response = self.check(request.send().await?).await?;
        let body = response.bytes().await?;

        serde_json::from_slice(&body).map_err(ApiError::Malformed)
    }

    pub async fn get_page(&self, path: &str, query: &[(&str, String)]) -> Result<Page, ApiError> {
        self.get_json::<ListResponse>(path, query).await.map(Page::from)
    }

    /// Follows `next_page` until the last page, up to `max_pages` requests.
    pub async fn get_all_pages(&self, path: &str, max_pages: u32) -> Result<Vec<Value>, ApiError> {
        let mut items = Vec::new();
        let mut page = 1;
        let mut requested = 0;

        while requested < max_pages {
            let current = self.get_page(path, &[("page", page.to_string())]).await?;
            requested += 1;
            items.extend(current.items);

            match current.next_page {
                Some(next) if next > page => page = next,
                _ => return Ok(items),
            }
        }

        warn!(
            api = self.name,
            path,
            max_pages,
            next_page = page,
            "page cap reached, remaining pages not fetched"
        );
        Ok(items)
    }

    async fn check(&self, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_secs);
        let message = response.text().await.unwrap_or_default();

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Authentication(format!(
                "{} responded {}",
                self.name, status
            )),
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited {
                retries: self.retry.max_retries,
                retry_after,
            },
            _ => ApiError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }
}

impl Debug for ApiClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn settings(base_url: &str) -> ApiClientSettings {
        ApiClientSettings {
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(1),
            retry: RetryPolicy::default(),
        }
    }

    #[test]
    fn rejects_blank_credentials_and_bad_urls() {
        let blank = Auth::Bearer(Sensitive::new(" ".to_string()));
        assert!(matches!(
            ApiClient::new("procurepro", settings("https://api.procurepro.test"), blank),
            Err(ApiError::Authentication(_))
        ));

        assert!(matches!(
            ApiClient::new("greentree", settings("greentree.local"), Auth::None),
            Err(ApiError::Config(_))
        ));
    }

    #[test]
    fn joins_paths_without_double_slashes() {
        let client =
            ApiClient::new("greentree", settings("https://erp.example.com/api/"), Auth::None).unwrap();

        assert_eq!(client.url("/projects"), "https://erp.example.com/api/projects");
        assert_eq!(client.url("suppliers"), "https://erp.example.com/api/suppliers");
    }

    #[test]
    fn debug_output_masks_credentials() {
        let auth = Auth::ApiKey {
            header: "X-API-Key",
            key: Sensitive::new("super-secret".to_string()),
        };
        let client = ApiClient::new("greentree", settings("https://erp.example.com"), auth).unwrap();

        assert!(!format!("{client:?}").contains("super-secret"));
    }

    #[test]
    fn list_responses_accept_bare_and_enveloped_pages() {
        let bare: ListResponse = serde_json::from_value(json!([{"id": 1}])).unwrap();
        assert_eq!(
            Page::from(bare),
            Page {
                items: vec![json!({"id": 1})],
                next_page: None
            }
        );

        let envelope: ListResponse =
            serde_json::from_value(json!({"data": [{"id": 2}], "next_page": 3})).unwrap();
        assert_eq!(
            Page::from(envelope),
            Page {
                items: vec![json!({"id": 2})],
                next_page: Some(3)
            }
        );
    }
}
