use std::{net::TcpListener, sync::Arc, time::Duration};

use precon_stream::gateway::{router, AppState};
use precon_stream::test_utils::{MockProcurementSource, MockStreamingClient, MockTopicAdmin};
use precon_stream::{throw, StreamKind, StreamService};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn spawn(producer: MockStreamingClient, sources: Vec<MockProcurementSource>) -> String {
    let topics = MockTopicAdmin::new().list_topics(StreamKind::all().map(StreamKind::topic));
    let streams = StreamService::new(Arc::new(producer), Arc::new(topics), Duration::from_secs(1)).await;

    let state = sources
        .into_iter()
        .fold(AppState::new(Arc::new(streams)), |state, source| {
            state.with_source(Arc::new(source))
        });

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(router(state).into_make_service()),
    );

    format!("http://{addr}")
}

async fn post(url: String, body: &str) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(url)
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap();

    let status = response.status();
    let body = response.text().await.unwrap();
    (status, serde_json::from_str(&body).unwrap())
}

#[tokio::test]
async fn streams_a_project_and_returns_its_key() {
    let producer = MockStreamingClient::new().send_sync("construction.projects", "project_42", Ok(true));
    let url = spawn(producer, vec![]).await;

    let (status, body) = post(
        format!("{url}/api/stream/projects"),
        r#"{"id": 42, "name": "Northern hospital extension"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({ "topic": "construction.projects", "key": "project_42" }));
}

#[tokio::test]
async fn rejects_bodies_that_are_not_json_objects() {
    let url = spawn(MockStreamingClient::new(), vec![]).await;

    for body in ["[1, 2, 3]", "not json", "\"project\""] {
        let (status, error) = post(format!("{url}/api/stream/risks"), body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(error["code"], "bad_request");
        assert!(error["error"].is_string());
    }
}

#[tokio::test]
async fn unacknowledged_publishes_are_bad_gateway() {
    let producer = MockStreamingClient::new().send_sync("construction.ml-predictions", "prediction_m-1", Ok(false));
    let url = spawn(producer, vec![]).await;

    let (status, error) = post(format!("{url}/api/stream/predictions"), r#"{"id": "m-1"}"#).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(error["code"], "publish_failed");
}

#[tokio::test]
async fn unknown_routes_are_json_not_found() {
    let url = spawn(MockStreamingClient::new(), vec![]).await;

    let (status, error) = post(format!("{url}/api/stream/invoices"), "{}").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "not_found");

    let (status, _) = post(format!("{url}/api/nothing"), "{}").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reflects_the_producer() {
    let url = spawn(MockStreamingClient::new().health_check(Ok(())), vec![]).await;
    let response = reqwest::get(format!("{url}/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report: Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
    assert_eq!(report["component"], "kafka");
    assert_eq!(report["status"], "healthy");

    let url = spawn(MockStreamingClient::new().health_check(Err(throw!("down"))), vec![]).await;
    let response = reqwest::get(format!("{url}/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let report: Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
    assert_eq!(report["status"], "offline");
    assert_eq!(report["error"], "Health check error");
}

#[tokio::test]
async fn request_ids_are_generated_or_propagated() {
    let url = spawn(MockStreamingClient::new(), vec![]).await;
    let client = reqwest::Client::new();

    let response = client.post(format!("{url}/api/stream/nope")).send().await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));

    let response = client
        .post(format!("{url}/api/stream/nope"))
        .header("x-request-id", "req-123")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn syncs_a_configured_source() {
    let source = MockProcurementSource::new()
        .named("greentree")
        .suppliers(vec![json!({"id": "S-1"}), json!({"id": "S-2"})]);
    let producer = MockStreamingClient::new()
        .send_sync("construction.suppliers", "supplier_S-1", Ok(true))
        .send_sync("construction.suppliers", "supplier_S-2", Ok(true));
    let url = spawn(producer, vec![source]).await;

    let (status, report) = post(format!("{url}/api/sync/greentree/suppliers"), "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        report,
        json!({
            "source": "greentree",
            "entity": "suppliers",
            "fetched": 2,
            "streamed": 2,
            "failed": 0
        })
    );
}

#[tokio::test]
async fn sync_errors_map_to_statuses() {
    let source = MockProcurementSource::new().named("greentree").rate_limited_projects();
    let url = spawn(MockStreamingClient::new(), vec![source]).await;

    let (status, error) = post(format!("{url}/api/sync/greentree/projects"), "").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error["code"], "rate_limited");

    let (status, _) = post(format!("{url}/api/sync/procurepro/projects"), "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post(format!("{url}/api/sync/greentree/risks"), "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sync_route_is_mounted_with_sources() {
    let projects: Vec<Value> = (0..20).map(|id| json!({ "id": id })).collect();
    let source = MockProcurementSource::new().named("procurepro").projects(projects);
    let url = spawn(MockStreamingClient::new().acking(), vec![source]).await;

    let (status, report) = post(format!("{url}/api/sync/procurepro/projects"), "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["fetched"], 20);
    assert_eq!(report["streamed"], 20);
    assert_eq!(report["failed"], 0);
}
