use std::str::FromStr;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::{AppState, HttpError};
use crate::health_status::HealthStatusReport;
use crate::sync::{sync_entities, SyncEntity, SyncReport};
use crate::StreamKind;

pub const HEALTH_COMPONENT: &str = "kafka";

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthStatusReport>) {
    let report = state
        .health
        .run(HEALTH_COMPONENT, state.streams.health_check())
        .await;

    let status = if report.is_available() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// Maps the plural path segment (`/api/stream/projects`) to its stream.
pub fn stream_kind(segment: &str) -> Option<StreamKind> {
    match segment {
        "projects" => Some(StreamKind::Project),
        "suppliers" => Some(StreamKind::Supplier),
        "risks" => Some(StreamKind::Risk),
        "predictions" => Some(StreamKind::MlPrediction),
        _ => None,
    }
}

pub async fn stream_event(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), HttpError> {
    let kind = stream_kind(&segment)
        .ok_or_else(|| HttpError::NotFound(format!("unknown stream `{segment}`")))?;

    let data: Value = serde_json::from_slice(&body)
        .map_err(|e| HttpError::BadRequest(format!("invalid JSON body: {e}")))?;
    if !data.is_object() {
        return Err(HttpError::BadRequest("body must be a JSON object".to_string()));
    }

    let key = kind.key_for(&data);
    if !state.streams.stream(kind, &data).await {
        return Err(HttpError::PublishFailed(kind.topic()));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "topic": kind.topic(), "key": key })),
    ))
}

pub async fn sync(
    State(state): State<AppState>,
    Path((source, entity)): Path<(String, String)>,
) -> Result<Json<SyncReport>, HttpError> {
    let source = state
        .sources
        .get(source.as_str())
        .ok_or_else(|| HttpError::NotFound(format!("unknown or disabled source `{source}`")))?;
    let entity = SyncEntity::from_str(&entity)
        .map_err(|_| HttpError::NotFound(format!("cannot sync `{entity}`")))?;

    let report = sync_entities(source.as_ref(), entity, &state.streams).await?;
    Ok(Json(report))
}

pub async fn not_found() -> HttpError {
    HttpError::NotFound("no such route".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_segments_are_plural() {
        assert_eq!(stream_kind("projects"), Some(StreamKind::Project));
        assert_eq!(stream_kind("predictions"), Some(StreamKind::MlPrediction));
        assert_eq!(stream_kind("project"), None);
    }
}
