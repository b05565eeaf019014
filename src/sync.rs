use std::fmt::Debug;

use futures_util::stream::{self, StreamExt};
use serde_json::Value;

use crate::api::{ApiError, GreentreeClient, ProcureProClient};
use crate::timeable::Timeable;
use crate::{async_trait, info, warn, Serialize, StreamKind, StreamService};

/// Records published concurrently per sync run.
const STREAM_CONCURRENCY: usize = 8;

/// A procurement system records can be pulled from.
#[async_trait]
pub trait ProcurementSource: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn fetch_projects(&self) -> Result<Vec<Value>, ApiError>;

    async fn fetch_suppliers(&self) -> Result<Vec<Value>, ApiError>;
}

#[async_trait]
impl ProcurementSource for GreentreeClient {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn fetch_projects(&self) -> Result<Vec<Value>, ApiError> {
        self.list_projects().await
    }

    async fn fetch_suppliers(&self) -> Result<Vec<Value>, ApiError> {
        self.list_suppliers().await
    }
}

#[async_trait]
impl ProcurementSource for ProcureProClient {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn fetch_projects(&self) -> Result<Vec<Value>, ApiError> {
        self.list_projects().await
    }

    async fn fetch_suppliers(&self) -> Result<Vec<Value>, ApiError> {
        self.list_suppliers().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SyncEntity {
    Projects,
    Suppliers,
}

impl SyncEntity {
    pub fn stream_kind(self) -> StreamKind {
        match self {
            Self::Projects => StreamKind::Project,
            Self::Suppliers => StreamKind::Supplier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub source: &'static str,
    pub entity: String,
    pub fetched: usize,
    pub streamed: usize,
    pub failed: usize,
}

/// Pulls every `entity` record from `source` and streams each one. A fetch failure
/// aborts the run; records that fail to publish are only counted.
pub async fn sync_entities(
    source: &dyn ProcurementSource,
    entity: SyncEntity,
    service: &StreamService,
) -> Result<SyncReport, ApiError> {
    let records = match entity {
        SyncEntity::Projects => source.fetch_projects().time_as(format!("fetch_{entity}")).await,
        SyncEntity::Suppliers => source.fetch_suppliers().time_as(format!("fetch_{entity}")).await,
    }
    .map_err(|e| {
        warn!(source = source.name(), %entity, error = %e, "fetch failed");
        e
    })?;

    let kind = entity.stream_kind();
    let fetched = records.len();
    let streamed = stream::iter(records)
        .map(move |record| async move { service.stream(kind, &record).await })
        .buffer_unordered(STREAM_CONCURRENCY)
        .filter(|ok| futures_util::future::ready(*ok))
        .count()
        .await;

    let report = SyncReport {
        source: source.name(),
        entity: entity.to_string(),
        fetched,
        streamed,
        failed: fetched - streamed,
    };
    info!(?report, "sync finished");

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn entities_parse_from_path_segments() {
        assert_eq!(SyncEntity::from_str("projects"), Ok(SyncEntity::Projects));
        assert_eq!(SyncEntity::from_str("suppliers"), Ok(SyncEntity::Suppliers));
        assert!(SyncEntity::from_str("risks").is_err());

        assert_eq!(SyncEntity::Suppliers.stream_kind(), StreamKind::Supplier);
        assert_eq!(SyncEntity::Projects.to_string(), "projects");
    }
}
