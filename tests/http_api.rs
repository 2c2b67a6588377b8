use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use docqa::{api, app, config::Config};
use httpmock::{
    Method::{GET, POST, PUT},
    MockServer,
};
use regex::Regex;
use serde_json::{Value, json};
use tower::ServiceExt;

const COLLECTION: &str = "kb";
const DIM: usize = 16;

async fn router_for(server: &MockServer) -> Router {
    let base_url = server.base_url();
    let config = Config::from_source(|key| match key {
        "QDRANT_URL" => Some(base_url.clone()),
        "COLLECTION_NAME" => Some(COLLECTION.into()),
        "EMBEDDING_DIMENSION" => Some(DIM.to_string()),
        "MAX_RETRIEVAL_RESULTS" => Some("3".into()),
        _ => None,
    })
    .expect("config");
    let state = app::build_state(config).await.expect("state");
    api::create_router(state)
}

async fn mock_collection_present(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/collections/{COLLECTION}"));
            then.status(200).json_body(json!({
                "status": "ok",
                "time": 0.0,
                "result": { "status": "green", "points_count": 1 }
            }));
        })
        .await;
}

fn stored_point(id: &str, content: &str, score: f64) -> Value {
    json!({
        "id": id,
        "version": 3,
        "score": score,
        "payload": {
            "content": content,
            "metadata": { "source": "faq" },
            "created_at": "2025-01-01T00:00:00Z",
            "content_hash": "ignored"
        },
        "vector": vec![0.25; DIM]
    })
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn ingest_upserts_point_with_document_payload() {
    let server = MockServer::start_async().await;
    mock_collection_present(&server).await;
    let upsert = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path(format!("/collections/{COLLECTION}/points"))
                .query_param("wait", "true")
                .body_contains(r#""content":"Qdrant stores vectors.""#)
                .body_contains(r#""content_hash":"#);
            then.status(200).json_body(json!({
                "status": "ok",
                "result": { "operation_id": 7, "status": "completed" }
            }));
        })
        .await;

    let app = router_for(&server).await;
    let (status, body) = call(
        &app,
        Method::POST,
        "/ingest",
        Some(json!({ "content": "Qdrant stores vectors.", "metadata": { "source": "faq" } })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["metadata"]["source"], "faq");
    assert_eq!(body["embedding"].as_array().expect("vector").len(), DIM);
    upsert.assert_async().await;
}

#[tokio::test]
async fn query_ranks_points_returned_by_qdrant() {
    let server = MockServer::start_async().await;
    mock_collection_present(&server).await;
    let low = "00000000-0000-0000-0000-000000000002";
    let high = "00000000-0000-0000-0000-000000000001";
    let query = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/collections/{COLLECTION}/points/query"))
                .json_body_partial(r#"{ "limit": 2, "with_payload": true }"#);
            then.status(200).json_body(json!({
                "status": "ok",
                "time": 0.001,
                "result": {
                    "points": [
                        stored_point(low, "Vectors are compared by cosine.", 0.41),
                        stored_point(high, "Qdrant stores vectors.", 0.87)
                    ]
                }
            }));
        })
        .await;

    let app = router_for(&server).await;
    let (status, body) = call(
        &app,
        Method::POST,
        "/query",
        Some(json!({ "query": "where are vectors stored?", "top_k": 2 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    query.assert_async().await;
    let documents = body["documents"].as_array().expect("documents");
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0]["id"], high);
    assert_eq!(documents[1]["id"], low);
    assert_eq!(body["synthesis"]["status"], "generated");
    assert_eq!(
        body["answer"],
        "Based on the most relevant document: Qdrant stores vectors...."
    );
}

#[tokio::test]
async fn deleting_a_missing_point_is_not_found() {
    let server = MockServer::start_async().await;
    mock_collection_present(&server).await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/collections/{COLLECTION}/points"))
                .json_body_partial(r#"{ "with_payload": true }"#);
            then.status(200)
                .json_body(json!({ "status": "ok", "result": [] }));
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/collections/{COLLECTION}/points/delete"));
            then.status(200).json_body(json!({ "status": "ok", "result": {} }));
        })
        .await;

    let app = router_for(&server).await;
    let (status, body) = call(
        &app,
        Method::DELETE,
        "/documents/7d3c0a3e-3f8b-4a8e-9a51-0c6a1e3f5b2d",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    delete.assert_hits_async(0).await;
}

#[tokio::test]
async fn health_reports_document_count_from_qdrant() {
    let server = MockServer::start_async().await;
    mock_collection_present(&server).await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/collections/{COLLECTION}/points/count"));
            then.status(200)
                .json_body(json!({ "status": "ok", "result": { "count": 12 } }));
        })
        .await;

    let app = router_for(&server).await;
    let (status, body) = call(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "connected");
    assert_eq!(body["documents_count"], 12);
}

#[tokio::test]
async fn unavailable_qdrant_surfaces_as_503_and_degraded_health() {
    let server = MockServer::start_async().await;
    let points_regex = Regex::new(&format!(r"^/collections/{COLLECTION}(/points.*)?$"))
        .expect("regex");
    server
        .mock_async(move |when, then| {
            when.path_matches(points_regex.clone());
            then.status(503).body("overloaded");
        })
        .await;

    let app = router_for(&server).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/query",
        Some(json!({ "query": "anything" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{body}");
    assert_eq!(body["error"], "store_error");

    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["store"], "disconnected");
    assert_eq!(body["documents_count"], 0);
}
