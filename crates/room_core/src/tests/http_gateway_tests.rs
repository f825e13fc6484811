use super::*;
use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode as AxumStatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{TimeZone, Utc};
use shared::{domain::RoomType, error::ErrorCode};
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex as AsyncMutex},
};

fn tester() -> UserContext {
    UserContext {
        id: shared::domain::UserId::new("u1"),
        username: "tess".to_string(),
        token: "tok-123".to_string(),
    }
}

fn sample_message(id: &str) -> MessageRecord {
    MessageRecord {
        id: MessageId::new(id),
        rid: RoomId::new("R1"),
        msg: "hi".to_string(),
        ts: Utc.timestamp_opt(1_000, 0).single().expect("ts"),
        sender: None,
        reactions: Default::default(),
        status: Default::default(),
        updated_at: None,
    }
}

async fn spawn_server(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

#[derive(Clone)]
struct SendCapture {
    tx: Arc<AsyncMutex<Option<oneshot::Sender<CapturedSend>>>>,
}

struct CapturedSend {
    token: Option<String>,
    user_id: Option<String>,
    msg: String,
}

async fn handle_send(
    State(state): State<SendCapture>,
    headers: HeaderMap,
    Json(payload): Json<SendMessageRequest>,
) {
    let captured = CapturedSend {
        token: headers
            .get("X-Auth-Token")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        user_id: headers
            .get("X-User-Id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        msg: payload.msg,
    };
    if let Some(tx) = state.tx.lock().await.take() {
        let _ = tx.send(captured);
    }
}

#[tokio::test]
async fn send_message_posts_the_payload_with_credentials() {
    let (tx, rx) = oneshot::channel();
    let state = SendCapture {
        tx: Arc::new(AsyncMutex::new(Some(tx))),
    };
    let app = Router::new()
        .route("/api/v1/rooms/R1/messages", post(handle_send))
        .with_state(state);
    let server_url = spawn_server(app).await;

    let gateway = HttpRemoteGateway::new(&server_url, tester()).expect("gateway");
    gateway
        .send_message(&RoomId::new("R1"), "hello")
        .await
        .expect("send");

    let captured = rx.await.expect("captured request");
    assert_eq!(captured.msg, "hello");
    assert_eq!(captured.token.as_deref(), Some("tok-123"));
    assert_eq!(captured.user_id.as_deref(), Some("u1"));
}

#[tokio::test]
async fn room_info_soft_fails_when_the_room_is_inaccessible() {
    // No routes at all: every probe answers 404.
    let server_url = spawn_server(Router::new()).await;
    let gateway = HttpRemoteGateway::new(&server_url, tester()).expect("gateway");

    let info = gateway
        .get_room_info(&RoomId::new("R1"))
        .await
        .expect("soft outcome");

    assert!(!info.success);
    assert!(info.room.is_none());
}

async fn handle_mismatched_info() -> Json<RoomInfoResponse> {
    Json(RoomInfoResponse {
        success: true,
        room: Some(RoomRecord {
            rid: RoomId::new("R2"),
            ..RoomRecord::default()
        }),
    })
}

#[tokio::test]
async fn room_info_rejects_a_mismatched_room_identity() {
    let app = Router::new().route("/api/v1/rooms/R1/info", get(handle_mismatched_info));
    let server_url = spawn_server(app).await;
    let gateway = HttpRemoteGateway::new(&server_url, tester()).expect("gateway");

    let err = gateway
        .get_room_info(&RoomId::new("R1"))
        .await
        .expect_err("must fail");

    assert!(err.to_string().contains("R2"), "unexpected error: {err}");
}

#[derive(Clone)]
struct QueryCapture {
    tx: Arc<AsyncMutex<Option<oneshot::Sender<HashMap<String, String>>>>>,
}

async fn handle_history(
    State(state): State<QueryCapture>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<HistoryResponse> {
    if let Some(tx) = state.tx.lock().await.take() {
        let _ = tx.send(params);
    }
    Json(HistoryResponse {
        messages: vec![sample_message("m1"), sample_message("m2")],
    })
}

#[tokio::test]
async fn load_history_sends_the_cursor_and_parses_the_page() {
    let (tx, rx) = oneshot::channel();
    let state = QueryCapture {
        tx: Arc::new(AsyncMutex::new(Some(tx))),
    };
    let app = Router::new()
        .route("/api/v1/rooms/R1/history", get(handle_history))
        .with_state(state);
    let server_url = spawn_server(app).await;
    let gateway = HttpRemoteGateway::new(&server_url, tester()).expect("gateway");

    let messages = gateway
        .load_history(HistoryRequest {
            rid: RoomId::new("R1"),
            kind: RoomType::Channel,
            latest: Utc.timestamp_opt(5_000, 0).single().expect("ts"),
            count: 50,
        })
        .await
        .expect("history");

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, MessageId::new("m1"));

    let params = rx.await.expect("captured query");
    assert_eq!(params.get("count").map(String::as_str), Some("50"));
    assert_eq!(params.get("t").map(String::as_str), Some("c"));
    assert!(params.get("latest").expect("latest").starts_with("1970"));
}

async fn handle_failing_join() -> (AxumStatusCode, Json<ApiError>) {
    (
        AxumStatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError {
            code: ErrorCode::Internal,
            message: "db down".to_string(),
        }),
    )
}

#[tokio::test]
async fn error_bodies_surface_through_the_shared_taxonomy() {
    let app = Router::new().route("/api/v1/rooms/R1/join", post(handle_failing_join));
    let server_url = spawn_server(app).await;
    let gateway = HttpRemoteGateway::new(&server_url, tester()).expect("gateway");

    let err = gateway
        .join_room(&RoomId::new("R1"))
        .await
        .expect_err("join must fail");

    assert!(err.to_string().contains("db down"), "unexpected error: {err}");
}

#[test]
fn rejects_an_invalid_server_url() {
    let err = HttpRemoteGateway::new("not a url", tester()).expect_err("must fail");
    assert!(matches!(err, HttpGatewayError::InvalidServerUrl { .. }));
}
