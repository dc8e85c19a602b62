//! Integration tests for the HTTP API
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`; the
//! metadata store is in memory and the analysis service is either a stub or
//! a real HTTP client pointed at a local listener.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use http_body_util::BodyExt;
use sagar::{
    AnalysisService, DISPATCHED_MESSAGE, GEOSPATIAL_CORRELATION_PATH, HttpAnalysisClient,
    InMemoryStore, StubAnalysis,
};
use serde_json::{Value, json};
use server::{ServerConfig, ServerState, build_router};
use tower::ServiceExt;

fn marine_store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::new().with_json_rows(
        "file_metadata",
        json!([
            {"id": 18, "file_type": "tabular", "processed_file_location": "/data/a.csv", "original_name": "occurrence.csv"},
            {"id": 15, "file_type": "tabular", "processed_file_location": "/data/b.csv", "original_name": "ozone.csv"},
            {"id": 21, "file_type": "image", "processed_file_location": "/data/otolith.png", "original_name": "otolith.png"},
        ]),
    ))
}

fn app(store: Arc<InMemoryStore>, analysis: Option<Arc<dyn AnalysisService>>) -> Router {
    let state = ServerState::with_collaborators(ServerConfig::default(), store, analysis);
    build_router(Arc::new(state))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes)))
    };
    (status, headers, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn correlate_body() -> Value {
    json!({
        "file1_id": 18,
        "file2_id": 15,
        "column1": "individualCount",
        "column2": "TO3",
    })
}

async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn root_reports_running() {
    let (status, _, body) = send(app(marine_store(), None), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "ok", "message": "SAGAR Backend Service is running."})
    );
}

#[tokio::test]
async fn search_without_filter_returns_all_rows() {
    let (status, _, body) = send(app(marine_store(), None), get("/search")).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    // Columns beyond the ones we model are passed through.
    assert_eq!(rows[0]["original_name"], json!("occurrence.csv"));
}

#[tokio::test]
async fn search_filters_by_file_type() {
    let (status, _, body) = send(app(marine_store(), None), get("/search?file_type=tabular")).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["file_type"] == json!("tabular")));

    let (_, _, body) = send(app(marine_store(), None), get("/search?file_type=image")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn search_unknown_type_is_empty_array() {
    let (status, _, body) = send(app(marine_store(), None), get("/search?file_type=sonar")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn search_blank_file_type_is_unfiltered() {
    let (_, _, body) = send(app(marine_store(), None), get("/search?file_type=")).await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn search_store_failure_is_500_with_detail() {
    let store = Arc::new(InMemoryStore::failing("connection reset by peer"));
    let (status, _, body) = send(app(store, None), get("/search")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], json!("INTERNAL_ERROR"));
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("An error occurred"));
    assert!(message.contains("connection reset by peer"));
}

#[tokio::test]
async fn correlate_dispatches_resolved_payload() {
    let store = marine_store();
    let analysis = Arc::new(StubAnalysis::replying(json!({"job_id": "abc", "status": "queued"})));
    let router = app(store.clone(), Some(analysis.clone()));

    let (status, _, body) = send(router, post_json("/discover-and-correlate", &correlate_body())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "message": DISPATCHED_MESSAGE,
            "ml_service_response": {"job_id": "abc", "status": "queued"},
        })
    );

    let received = analysis.received();
    assert_eq!(received.len(), 1);
    assert_eq!(
        serde_json::to_value(&received[0]).unwrap(),
        json!({
            "file1_path": "/data/a.csv",
            "file2_path": "/data/b.csv",
            "column1": "individualCount",
            "column2": "TO3",
            "file1_lat_col": "decimalLatitude",
            "file1_lon_col": "decimalLongitude",
            "file2_lat_col": "lat",
            "file2_lon_col": "lon",
        })
    );
    assert_eq!(store.query_count(), 1);
}

#[tokio::test]
async fn correlate_carries_explicit_coordinate_columns() {
    let analysis = Arc::new(StubAnalysis::replying(json!({})));
    let router = app(marine_store(), Some(analysis.clone()));

    let mut body = correlate_body();
    body["file1_lat_col"] = json!("LAT");
    body["file2_lon_col"] = json!("Longitude");
    let (status, _, _) = send(router, post_json("/discover-and-correlate", &body)).await;

    assert_eq!(status, StatusCode::OK);
    let payload = &analysis.received()[0];
    assert_eq!(payload.file1_lat_col, "LAT");
    assert_eq!(payload.file1_lon_col, "decimalLongitude");
    assert_eq!(payload.file2_lat_col, "lat");
    assert_eq!(payload.file2_lon_col, "Longitude");
}

#[tokio::test]
async fn correlate_unknown_id_is_404_without_dispatch() {
    let analysis = Arc::new(StubAnalysis::replying(json!({})));
    let router = app(marine_store(), Some(analysis.clone()));

    let mut body = correlate_body();
    body["file2_id"] = json!(999);
    let (status, _, body) = send(router, post_json("/discover-and-correlate", &body)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("NOT_FOUND"));
    assert!(body["error"]["message"].as_str().unwrap().contains("999"));
    assert_eq!(analysis.call_count(), 0);
}

#[tokio::test]
async fn correlate_without_ml_url_is_500_without_store_query() {
    let store = marine_store();
    let router = app(store.clone(), None);

    let (status, _, body) = send(router, post_json("/discover-and-correlate", &correlate_body())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], json!("CONFIG_ERROR"));
    assert_eq!(store.query_count(), 0);
}

#[tokio::test]
async fn correlate_rejects_malformed_bodies_before_store_access() {
    let bad_bodies = [
        json!({"file1_id": "18", "file2_id": 15, "column1": "a", "column2": "b"}),
        json!({"file1_id": 18.5, "file2_id": 15, "column1": "a", "column2": "b"}),
        json!({"file1_id": 18, "column1": "a", "column2": "b"}),
        json!({"file1_id": 18, "file2_id": 15, "column1": "a"}),
        json!({"file1_id": 18, "file2_id": 15, "column1": 7, "column2": "b"}),
        json!([18, 15]),
    ];

    for bad in bad_bodies {
        let store = marine_store();
        let analysis = Arc::new(StubAnalysis::replying(json!({})));
        let router = app(store.clone(), Some(analysis.clone()));

        let (status, _, body) = send(router, post_json("/discover-and-correlate", &bad)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "body: {bad}");
        assert_eq!(body["error"]["code"], json!("VALIDATION_ERROR"));
        assert_eq!(store.query_count(), 0);
        assert_eq!(analysis.call_count(), 0);
    }
}

#[tokio::test]
async fn correlate_rejects_invalid_json_syntax() {
    let request = Request::builder()
        .method("POST")
        .uri("/discover-and-correlate")
        .header("content-type", "application/json")
        .body(Body::from("{\"file1_id\": 18,"))
        .unwrap();
    let (status, _, body) = send(app(marine_store(), None), request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], json!("VALIDATION_ERROR"));
}

#[tokio::test]
async fn correlate_without_json_content_type_is_415() {
    let store = marine_store();
    let request = Request::builder()
        .method("POST")
        .uri("/discover-and-correlate")
        .body(Body::from(correlate_body().to_string()))
        .unwrap();
    let (status, _, body) = send(app(store.clone(), None), request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"]["code"], json!("UNSUPPORTED_MEDIA_TYPE"));
    assert_eq!(store.query_count(), 0);
}

#[tokio::test]
async fn correlate_oversized_body_is_413() {
    let mut body = correlate_body();
    body["column1"] = json!("x".repeat(2 * 1024 * 1024));
    let (status, _, reply) = send(
        app(marine_store(), None),
        post_json("/discover-and-correlate", &body),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(reply["error"]["code"], json!("PAYLOAD_TOO_LARGE"));
}

#[tokio::test]
async fn correlate_truncated_service_reply_is_503() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let _ = socket.read(&mut buf).await;
        let _ = socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 500\r\n\r\n{\"job\":",
            )
            .await;
    });

    let client = HttpAnalysisClient::new(&format!("http://{addr}")).unwrap();
    let (status, _, body) = send(
        app(marine_store(), Some(Arc::new(client))),
        post_json("/discover-and-correlate", &correlate_body()),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], json!("SERVICE_UNAVAILABLE"));
}

#[tokio::test]
async fn correlate_unreachable_service_is_503_with_transport_text() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpAnalysisClient::new(&format!("http://{addr}")).unwrap();
    let router = app(marine_store(), Some(Arc::new(client)));

    let (status, _, body) = send(router, post_json("/discover-and-correlate", &correlate_body())).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], json!("SERVICE_UNAVAILABLE"));
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("Could not connect to the analysis service: "));
    assert!(message.len() > "Could not connect to the analysis service: ".len());
}

#[tokio::test]
async fn correlate_timeout_is_503() {
    let stub = Router::new().route(
        GEOSPATIAL_CORRELATION_PATH,
        axum::routing::post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            axum::Json(json!({}))
        }),
    );
    let base = spawn_stub(stub).await;

    let client = HttpAnalysisClient::with_timeout(&base, Duration::from_millis(200)).unwrap();
    let router = app(marine_store(), Some(Arc::new(client)));

    let (status, _, body) = send(router, post_json("/discover-and-correlate", &correlate_body())).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], json!("SERVICE_UNAVAILABLE"));
}

#[tokio::test]
async fn correlate_downstream_error_status_is_500() {
    let stub = Router::new().route(
        GEOSPATIAL_CORRELATION_PATH,
        axum::routing::post(|| async {
            (StatusCode::BAD_REQUEST, "column TO3 missing in /data/b.csv")
        }),
    );
    let base = spawn_stub(stub).await;

    let client = HttpAnalysisClient::new(&base).unwrap();
    let router = app(marine_store(), Some(Arc::new(client)));

    let (status, _, body) = send(router, post_json("/discover-and-correlate", &correlate_body())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], json!("INTERNAL_ERROR"));
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("400"));
    assert!(message.contains("column TO3 missing"));
}

#[tokio::test]
async fn correlate_relays_real_service_response() {
    let stub = Router::new().route(
        GEOSPATIAL_CORRELATION_PATH,
        axum::routing::post(|axum::Json(payload): axum::Json<Value>| async move {
            axum::Json(json!({
                "pearson_r": 0.61,
                "echo": payload["file2_path"],
            }))
        }),
    );
    let base = spawn_stub(stub).await;

    let client = HttpAnalysisClient::new(&base).unwrap();
    let router = app(marine_store(), Some(Arc::new(client)));

    let (status, _, body) = send(router, post_json("/discover-and-correlate", &correlate_body())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["ml_service_response"],
        json!({"pearson_r": 0.61, "echo": "/data/b.csv"})
    );
}

#[tokio::test]
async fn health_and_ready() {
    let (status, _, body) = send(app(marine_store(), None), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));

    let (status, _, body) = send(app(marine_store(), None), get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["components"]["metadata_store"], json!("ready"));
    assert_eq!(body["components"]["analysis_service"], json!("not_configured"));
}

#[tokio::test]
async fn ready_fails_when_store_is_down() {
    let store = Arc::new(InMemoryStore::failing("no route to host"));
    let (status, _, body) = send(app(store, None), get("/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], json!("not_ready"));
    assert!(body["error"].as_str().unwrap().contains("no route to host"));
}

#[tokio::test]
async fn unknown_route_is_structured_404() {
    let (status, _, body) = send(app(marine_store(), None), get("/api/v1/nothing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("NOT_FOUND"));
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let request = Request::builder()
        .uri("/")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(app(marine_store(), None), request).await;
    assert_eq!(headers["x-request-id"], "req-123");

    let (_, headers, _) = send(app(marine_store(), None), get("/")).await;
    let generated = headers["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);
}
