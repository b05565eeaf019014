use serde_json::Value;

use super::{ApiClient, ApiConfig, ApiError, Auth};
use crate::config::validate_http_url;
use crate::{ConfigError, Parser, Sensitive, Validate};

#[derive(Debug, Clone, Parser)]
pub struct ProcureProConfig {
    /// Leave unset to disable the ProcurePro integration.
    #[clap(long = "procurepro-api-url", env = "PROCUREPRO_API_URL")]
    pub procurepro_api_url: Option<String>,

    #[clap(long = "procurepro-api-token", env = "PROCUREPRO_API_TOKEN")]
    pub procurepro_api_token: Option<Sensitive<String>>,

    /// Upper bound on pages followed by a single list call.
    #[clap(
        long = "procurepro-max-pages",
        env = "PROCUREPRO_MAX_PAGES",
        default_value = "50"
    )]
    pub procurepro_max_pages: u32,
}

impl Validate for ProcureProConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.procurepro_max_pages == 0 {
            return Err(ConfigError::invalid("procurepro-max-pages", "must be positive"));
        }
        match &self.procurepro_api_url {
            Some(url) => validate_http_url("procurepro-api-url", url),
            None => Ok(()),
        }
    }
}

/// ProcurePro tendering client, authenticated with a bearer token. List calls follow
/// `next_page` links.
#[derive(Debug, Clone)]
pub struct ProcureProClient {
    client: ApiClient,
    max_pages: u32,
}

impl ProcureProClient {
    pub const NAME: &'static str = "procurepro";

    pub fn from_config(config: &ProcureProConfig, api: &ApiConfig) -> Result<Option<Self>, ApiError> {
        let Some(url) = &config.procurepro_api_url else {
            return Ok(None);
        };
        let token = config.procurepro_api_token.clone().ok_or_else(|| {
            ApiError::Authentication("procurepro: PROCUREPRO_API_TOKEN is not set".to_string())
        })?;

        let client = ApiClient::new(Self::NAME, api.settings(url.as_str()), Auth::Bearer(token))?;
        Ok(Some(Self {
            client,
            max_pages: config.procurepro_max_pages,
        }))
    }

    pub async fn list_projects(&self) -> Result<Vec<Value>, ApiError> {
        self.client.get_all_pages("projects", self.max_pages).await
    }

    pub async fn list_suppliers(&self) -> Result<Vec<Value>, ApiError> {
        self.client.get_all_pages("suppliers", self.max_pages).await
    }

    /// Tender packages of one project.
    pub async fn list_packages(&self, project_id: &str) -> Result<Vec<Value>, ApiError> {
        self.client
            .get_all_pages(&format!("projects/{project_id}/packages"), self.max_pages)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_without_token_is_an_authentication_error() {
        let config = ProcureProConfig::parse_from([
            "test",
            "--procurepro-api-url",
            "https://api.procurepro.example.com/v1",
        ]);

        let error = ProcureProClient::from_config(&config, &ApiConfig::parse_from(["test"])).unwrap_err();
        assert!(matches!(error, ApiError::Authentication(_)));
    }

    #[test]
    fn page_cap_must_be_positive() {
        let config = ProcureProConfig::parse_from(["test", "--procurepro-max-pages", "0"]);

        assert_eq!(
            config.validate(),
            Err(ConfigError::invalid("procurepro-max-pages", "must be positive"))
        );
    }
}
