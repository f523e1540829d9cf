use super::*;
use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use shared::error::ErrorCode;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct DutyServerState {
    rows: Arc<Mutex<Vec<serde_json::Value>>>,
    next_key: Arc<Mutex<u64>>,
    seen_paths: Arc<Mutex<Vec<String>>>,
}

async fn list_duties(State(state): State<DutyServerState>) -> Json<Vec<serde_json::Value>> {
    state.seen_paths.lock().await.push("GET /duties".into());
    Json(state.rows.lock().await.clone())
}

async fn create_duty(
    State(state): State<DutyServerState>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.seen_paths.lock().await.push("POST /duties".into());
    if payload.get("key").is_some() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"code": "validation", "message": "key is assigned by the server"})),
        );
    }
    let mut next_key = state.next_key.lock().await;
    *next_key += 1;
    let mut row = payload;
    row["key"] = json!(*next_key);
    state.rows.lock().await.push(row.clone());
    (StatusCode::CREATED, Json(row))
}

async fn update_duty(
    State(state): State<DutyServerState>,
    Path(key): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.seen_paths.lock().await.push(format!("PUT /duties/{key}"));
    let mut rows = state.rows.lock().await;
    match rows.iter_mut().find(|row| row_key(row) == key) {
        Some(row) => {
            *row = payload;
            (StatusCode::OK, Json(row.clone()))
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"code": "not_found", "message": format!("no duty {key}")})),
        ),
    }
}

async fn delete_duty(
    State(state): State<DutyServerState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    state.seen_paths.lock().await.push(format!("DELETE /duties/{key}"));
    let mut rows = state.rows.lock().await;
    match rows.iter().position(|row| row_key(row) == key) {
        Some(index) => (StatusCode::OK, Json(rows.remove(index))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"code": "not_found", "message": format!("no duty {key}")})),
        ),
    }
}

fn row_key(row: &serde_json::Value) -> String {
    match &row["key"] {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

async fn serve(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

async fn spawn_duty_server(seed: Vec<serde_json::Value>) -> (String, DutyServerState) {
    let state = DutyServerState::default();
    *state.next_key.lock().await = seed.len() as u64;
    *state.rows.lock().await = seed;
    let app = Router::new()
        .route("/duties", get(list_duties).post(create_duty))
        .route("/duties/:key", axum::routing::put(update_duty).delete(delete_duty))
        .with_state(state.clone());
    (serve(app).await, state)
}

fn gateway_for(base_url: &str) -> HttpDutyGateway {
    HttpDutyGateway::new(&Settings::default().with_base_url(base_url)).expect("gateway")
}

#[tokio::test]
async fn list_decodes_string_and_integer_keys() {
    let (base_url, _state) = spawn_duty_server(vec![
        json!({"key": "1", "id": "first", "name": "duty1"}),
        json!({"key": 2, "id": "second", "name": "duty2"}),
    ])
    .await;

    let rows = gateway_for(&base_url).list().await.expect("list");
    assert_eq!(
        rows,
        vec![
            Duty::new("1", "first", "duty1"),
            Duty::new("2", "second", "duty2"),
        ]
    );
}

#[tokio::test]
async fn create_posts_draft_without_key() {
    let (base_url, state) =
        spawn_duty_server(vec![json!({"key": "1", "id": "first", "name": "duty1"})]).await;

    let created = gateway_for(&base_url)
        .create(&DutyDraft {
            id: "second".into(),
            name: "duty2".into(),
        })
        .await
        .expect("create");

    assert_eq!(created, Duty::new("2", "second", "duty2"));
    assert_eq!(state.rows.lock().await.len(), 2);
}

#[tokio::test]
async fn update_and_delete_address_rows_by_key() {
    let (base_url, state) =
        spawn_duty_server(vec![json!({"key": "1", "id": "first", "name": "duty1"})]).await;
    let gateway = gateway_for(&base_url);
    let key = DutyKey::new("1");

    let updated = gateway
        .update(&key, &Duty::new("1", "first", "duty1-renamed"))
        .await
        .expect("update");
    assert_eq!(updated.name, "duty1-renamed");

    let deleted = gateway.delete(&key).await.expect("delete");
    assert_eq!(deleted.key, key);
    assert!(state.rows.lock().await.is_empty());
    assert_eq!(
        *state.seen_paths.lock().await,
        vec!["PUT /duties/1".to_string(), "DELETE /duties/1".to_string()]
    );
}

#[tokio::test]
async fn keys_are_sent_as_a_single_path_segment() {
    let (base_url, state) =
        spawn_duty_server(vec![json!({"key": "a b/c", "id": "x", "name": "y"})]).await;

    let deleted = gateway_for(&base_url)
        .delete(&DutyKey::new("a b/c"))
        .await
        .expect("delete");
    assert_eq!(deleted.key.as_str(), "a b/c");
    assert_eq!(
        *state.seen_paths.lock().await,
        vec!["DELETE /duties/a b/c".to_string()]
    );
}

#[tokio::test]
async fn structured_error_body_surfaces_as_client_failure() {
    let (base_url, _state) = spawn_duty_server(Vec::new()).await;

    let err = gateway_for(&base_url)
        .delete(&DutyKey::new("missing"))
        .await
        .expect_err("must fail");

    assert_eq!(err.kind(), RemoteFailureKind::Client);
    match err {
        GatewayError::Status {
            status, message, ..
        } => {
            assert_eq!(status, 404);
            assert_eq!(message, "no duty missing");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn plain_server_error_is_classified_as_server_failure() {
    let app = Router::new().route(
        "/duties",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database offline") }),
    );
    let base_url = serve(app).await;

    let err = gateway_for(&base_url).list().await.expect_err("must fail");
    assert_eq!(err.kind(), RemoteFailureKind::Server);
    assert!(err.to_string().contains("database offline"), "{err}");
}

#[tokio::test]
async fn malformed_body_is_a_decode_failure() {
    let app = Router::new().route(
        "/duties",
        get(|| async { Json(json!([{"id": "no-key"}])) }),
    );
    let base_url = serve(app).await;

    let err = gateway_for(&base_url).list().await.expect_err("must fail");
    assert_eq!(err.kind(), RemoteFailureKind::Decode);
}

#[tokio::test]
async fn refused_connection_is_a_network_failure() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = gateway_for(&format!("http://{addr}"))
        .list()
        .await
        .expect_err("must fail");
    assert_eq!(err.kind(), RemoteFailureKind::Network);
}

#[tokio::test]
async fn slow_service_hits_request_timeout() {
    let app = Router::new().route(
        "/duties",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(Vec::<serde_json::Value>::new())
        }),
    );
    let base_url = serve(app).await;
    let settings = Settings {
        request_timeout_secs: 1,
        ..Settings::default().with_base_url(&base_url)
    };

    let err = HttpDutyGateway::new(&settings)
        .expect("gateway")
        .list()
        .await
        .expect_err("must time out");
    assert_eq!(err.kind(), RemoteFailureKind::Timeout);
}

#[test]
fn collection_url_appends_to_base_path() {
    assert_eq!(
        gateway_for("http://localhost:3001").collection_url().as_str(),
        "http://localhost:3001/duties"
    );
    assert_eq!(
        gateway_for("http://localhost:3001/api/").collection_url().as_str(),
        "http://localhost:3001/api/duties"
    );
}

#[test]
fn rejects_unusable_base_urls() {
    for base_url in ["not a url", "mailto:duties@example.com"] {
        let settings = Settings {
            base_url: base_url.to_string(),
            ..Settings::default()
        };
        assert!(HttpDutyGateway::new(&settings).is_err(), "{base_url}");
    }
}

#[test]
fn error_code_round_trips_through_status_message() {
    let body = serde_json::to_string(&ApiError::new(ErrorCode::Conflict, "stale row")).expect("json");
    let url = Url::parse("http://localhost:3001/duties/1").expect("url");
    let err = GatewayError::from_status(&url, StatusCode::CONFLICT, &body);
    assert_eq!(err.kind(), RemoteFailureKind::Client);
    assert_eq!(err.to_string(), "http://localhost:3001/duties/1 returned 409: stale row");
}
