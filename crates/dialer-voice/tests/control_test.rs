use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use dialer_voice::{
    ApiConfig, CallControl, CallControlClient, CredentialSource, DeviceConfig,
    HttpCredentialSource, PlacedCall, TextRoute, VoiceError,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Serves `router` on an ephemeral port and returns its base URL.
async fn spawn_backend(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

type Bodies = Arc<Mutex<Vec<Value>>>;

fn recording_route(path: &str, reply: (StatusCode, Value)) -> (Router, Bodies) {
    let bodies: Bodies = Arc::new(Mutex::new(Vec::new()));
    let recorded = bodies.clone();
    let router = Router::new().route(
        path,
        post(move |Json(body): Json<Value>| {
            let recorded = recorded.clone();
            let reply = reply.clone();
            async move {
                recorded.lock().unwrap().push(body);
                (reply.0, Json(reply.1))
            }
        }),
    );
    (router, bodies)
}

#[tokio::test]
async fn place_call_success_sends_target_and_text() {
    let (router, bodies) = recording_route(
        "/call",
        (
            StatusCode::OK,
            json!({ "status": "success", "call_sid": "CA123", "message": "call initiated" }),
        ),
    );
    let base = spawn_backend(router).await;
    let client = CallControlClient::new(ApiConfig::new(base)).unwrap();

    let placed = client
        .place_call("+15551234567", Some("hello there"))
        .await
        .unwrap();

    assert_eq!(
        placed,
        PlacedCall {
            call_id: Some("CA123".to_string())
        }
    );
    let bodies = bodies.lock().unwrap();
    assert_eq!(
        bodies[0],
        json!({ "to": "+15551234567", "text": "hello there" })
    );
}

#[tokio::test]
async fn place_call_omits_absent_text() {
    let (router, bodies) = recording_route(
        "/call",
        (StatusCode::OK, json!({ "status": "success" })),
    );
    let base = spawn_backend(router).await;
    let client = CallControlClient::new(ApiConfig::new(base)).unwrap();

    let placed = client.place_call("+15551234567", None).await.unwrap();

    assert_eq!(placed.call_id, None);
    assert_eq!(bodies.lock().unwrap()[0], json!({ "to": "+15551234567" }));
}

#[tokio::test]
async fn place_call_error_payload_over_http_200_is_a_failure() {
    let (router, _) = recording_route(
        "/call",
        (StatusCode::OK, json!({ "status": "error", "error": "busy" })),
    );
    let base = spawn_backend(router).await;
    let client = CallControlClient::new(ApiConfig::new(base)).unwrap();

    let result = client.place_call("+15551234567", None).await;
    assert_eq!(result, Err(VoiceError::CallPlacement("busy".to_string())));
}

#[tokio::test]
async fn place_call_bad_request_reports_backend_reason() {
    let (router, _) = recording_route(
        "/call",
        (
            StatusCode::BAD_REQUEST,
            json!({ "error": "number must include a country code" }),
        ),
    );
    let base = spawn_backend(router).await;
    let client = CallControlClient::new(ApiConfig::new(base)).unwrap();

    let result = client.place_call("5551234567", None).await;
    assert_eq!(
        result,
        Err(VoiceError::CallPlacement(
            "number must include a country code".to_string()
        ))
    );
}

#[tokio::test]
async fn place_call_unreachable_backend() {
    let mut config = ApiConfig::new("http://127.0.0.1:1");
    config.request_timeout_secs = 2;
    let client = CallControlClient::new(config).unwrap();

    match client.place_call("+15551234567", None).await {
        Err(VoiceError::CallPlacement(msg)) => assert!(msg.contains("request failed")),
        other => panic!("expected CallPlacement error, got {:?}", other),
    }
}

#[tokio::test]
async fn push_text_addresses_call_sid() {
    let (router, bodies) = recording_route("/send-text", (StatusCode::OK, json!({ "ok": true })));
    let base = spawn_backend(router).await;
    let client = CallControlClient::new(ApiConfig::new(base)).unwrap();

    client.push_text(Some("CA123"), "one moment").await.unwrap();

    assert_eq!(
        bodies.lock().unwrap()[0],
        json!({ "callSid": "CA123", "text": "one moment" })
    );
}

#[tokio::test]
async fn push_text_push_tts_route_sends_text_only() {
    let (router, bodies) = recording_route("/push_tts", (StatusCode::OK, json!({})));
    let base = spawn_backend(router).await;
    let mut config = ApiConfig::new(base);
    config.text_route = TextRoute::PushTts;
    let client = CallControlClient::new(config).unwrap();

    client.push_text(Some("CA123"), "hi").await.unwrap();

    assert_eq!(bodies.lock().unwrap()[0], json!({ "text": "hi" }));
}

#[tokio::test]
async fn push_text_server_error_is_text_dispatch_error() {
    let (router, _) = recording_route(
        "/send-text",
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "tts down" })),
    );
    let base = spawn_backend(router).await;
    let client = CallControlClient::new(ApiConfig::new(base)).unwrap();

    let result = client.push_text(None, "hi").await;
    assert!(matches!(result, Err(VoiceError::TextDispatch(_))));
}

#[tokio::test]
async fn end_call_without_endpoint_is_a_local_no_op() {
    let client = CallControlClient::new(ApiConfig::new("http://127.0.0.1:1")).unwrap();
    assert_eq!(client.end_call(Some("CA123")).await, Ok(()));
}

#[tokio::test]
async fn end_call_posts_to_configured_endpoint() {
    let (router, bodies) = recording_route("/end-call", (StatusCode::OK, json!({})));
    let base = spawn_backend(router).await;
    let mut config = ApiConfig::new(base);
    config.end_call_path = Some("/end-call".to_string());
    let client = CallControlClient::new(config).unwrap();

    client.end_call(Some("CA9")).await.unwrap();

    assert_eq!(bodies.lock().unwrap()[0], json!({ "callSid": "CA9" }));
}

fn token_router(reply: (StatusCode, Value), seen: Arc<Mutex<Option<String>>>) -> Router {
    Router::new().route(
        "/token",
        get(move |Query(params): Query<HashMap<String, String>>| {
            let reply = reply.clone();
            let seen = seen.clone();
            async move {
                *seen.lock().unwrap() = params.get("identity").cloned();
                (reply.0, Json(reply.1))
            }
        }),
    )
}

#[tokio::test]
async fn token_fetch_passes_identity() {
    let seen = Arc::new(Mutex::new(None));
    let base = spawn_backend(token_router(
        (StatusCode::OK, json!({ "token": "jwt-abc" })),
        seen.clone(),
    ))
    .await;
    let device = DeviceConfig {
        identity: Some("operator-7".to_string()),
        ..DeviceConfig::default()
    };
    let source = HttpCredentialSource::new(&ApiConfig::new(base), &device).unwrap();

    assert_eq!(source.fetch_token().await, Ok("jwt-abc".to_string()));
    assert_eq!(seen.lock().unwrap().as_deref(), Some("operator-7"));
}

#[tokio::test]
async fn token_fetch_rejects_non_string_token() {
    let base = spawn_backend(token_router(
        (StatusCode::OK, json!({ "token": 12345 })),
        Arc::new(Mutex::new(None)),
    ))
    .await;
    let source = HttpCredentialSource::new(&ApiConfig::new(base), &DeviceConfig::default()).unwrap();

    assert!(matches!(
        source.fetch_token().await,
        Err(VoiceError::CredentialFetch(_))
    ));
}

#[tokio::test]
async fn token_fetch_surfaces_backend_error() {
    let base = spawn_backend(token_router(
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "missing TWIML app" }),
        ),
        Arc::new(Mutex::new(None)),
    ))
    .await;
    let source = HttpCredentialSource::new(&ApiConfig::new(base), &DeviceConfig::default()).unwrap();

    assert_eq!(
        source.fetch_token().await,
        Err(VoiceError::CredentialFetch("missing TWIML app".to_string()))
    );
}
