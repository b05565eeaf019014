use serde_json::Value;

use crate::api::ApiError;
use crate::async_trait;
use crate::sync::ProcurementSource as ProcurementSourceInterface;
use mockall::mock;

mock! {
    pub ProcurementSource {}

    #[async_trait]
    impl ProcurementSourceInterface for ProcurementSource {
        fn name(&self) -> &'static str;
        async fn fetch_projects(&self) -> Result<Vec<Value>, ApiError>;
        async fn fetch_suppliers(&self) -> Result<Vec<Value>, ApiError>;
    }
}

impl MockProcurementSource {
    pub fn named(mut self, name: &'static str) -> Self {
        self.expect_name().return_const(name);
        self
    }

    pub fn projects(mut self, projects: Vec<Value>) -> Self {
        self.expect_fetch_projects()
            .times(1)
            .returning(move || Ok(projects.clone()));

        self
    }

    pub fn suppliers(mut self, suppliers: Vec<Value>) -> Self {
        self.expect_fetch_suppliers()
            .times(1)
            .returning(move || Ok(suppliers.clone()));

        self
    }

    pub fn rate_limited_projects(mut self) -> Self {
        self.expect_fetch_projects().times(1).returning(|| {
            Err(ApiError::RateLimited {
                retries: 3,
                retry_after: None,
            })
        });

        self
    }
}
