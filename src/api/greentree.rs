use serde_json::Value;

use super::{ApiClient, ApiConfig, ApiError, Auth};
use crate::config::validate_http_url;
use crate::{ConfigError, Parser, Sensitive, Validate};

pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Clone, Parser)]
pub struct GreentreeConfig {
    /// Leave unset to disable the Greentree integration.
    #[clap(long = "greentree-api-url", env = "GREENTREE_API_URL")]
    pub greentree_api_url: Option<String>,

    #[clap(long = "greentree-api-key", env = "GREENTREE_API_KEY")]
    pub greentree_api_key: Option<Sensitive<String>>,
}

impl Validate for GreentreeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match &self.greentree_api_url {
            Some(url) => validate_http_url("greentree-api-url", url),
            None => Ok(()),
        }
    }
}

/// Greentree ERP client, authenticated with an API key header.
#[derive(Debug, Clone)]
pub struct GreentreeClient {
    client: ApiClient,
}

impl GreentreeClient {
    pub const NAME: &'static str = "greentree";

    /// `None` when no URL is configured. A URL without a key is an authentication
    /// error.
    pub fn from_config(config: &GreentreeConfig, api: &ApiConfig) -> Result<Option<Self>, ApiError> {
        let Some(url) = &config.greentree_api_url else {
            return Ok(None);
        };
        let key = config
            .greentree_api_key
            .clone()
            .ok_or_else(|| ApiError::Authentication("greentree: GREENTREE_API_KEY is not set".to_string()))?;

        let auth = Auth::ApiKey {
            header: API_KEY_HEADER,
            key,
        };
        ApiClient::new(Self::NAME, api.settings(url.as_str()), auth).map(|client| Some(Self { client }))
    }

    pub async fn list_projects(&self) -> Result<Vec<Value>, ApiError> {
        self.client.get_page("projects", &[]).await.map(|page| page.items)
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Value, ApiError> {
        self.client.get_json(&format!("projects/{project_id}"), &[]).await
    }

    pub async fn list_suppliers(&self) -> Result<Vec<Value>, ApiError> {
        self.client.get_page("suppliers", &[]).await.map(|page| page.items)
    }
}
