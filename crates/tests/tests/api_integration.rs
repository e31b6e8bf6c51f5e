use std::net::SocketAddr;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceExt;
use triage_agents::OpenAiRuntimeConfig;
use triage_api::{build_app, ApiConfig};
use triage_core::{
    IntentKey, TemplateStore, DISCLAIMER, SAFETY_REJECTION_ERROR, SAFETY_REJECTION_MESSAGE,
};

fn rules_only_app() -> Router {
    build_app(&ApiConfig::default()).expect("app should build")
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let source = response
        .headers()
        .get("x-advice-source")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, source, parsed)
}

/// Serves a fake Responses API on a random local port.
async fn spawn_model_server(status: StatusCode, body: Value) -> SocketAddr {
    let handler = move || {
        let body = body.clone();
        async move { (status, Json(body)).into_response() }
    };
    let app = Router::new().route("/v1/responses", post(handler));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn app_with_model(addr: SocketAddr) -> Router {
    let config = ApiConfig {
        openai: Some(
            OpenAiRuntimeConfig::new("sk-test").with_base_url(format!("http://{addr}/v1")),
        ),
        external_timeout: Duration::from_secs(5),
        ..ApiConfig::default()
    };
    build_app(&config).expect("app should build")
}

#[tokio::test]
async fn health_reports_rules_only_mode() {
    let (status, _, body) = send(
        rules_only_app(),
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["capabilities"]["ai_fallback"], false);
}

#[tokio::test]
async fn fever_and_headache_returns_fever_template() {
    let (status, source, body) = send(
        rules_only_app(),
        chat_request(json!({ "message": "I have a fever and headache" })),
    )
    .await;

    let store = TemplateStore::standard();
    let fever = store.lookup(IntentKey::Fever).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("template"));
    assert_eq!(body["causes"], fever.causes.as_str());
    assert_eq!(body["medicine_categories"], json!(fever.medicine_categories));
    assert_eq!(body["home_remedies"], json!(fever.home_remedies));
    assert_eq!(body["red_flags"], json!(fever.red_flags));
    assert_eq!(
        body["next_steps"],
        format!("{}{}", fever.next_steps, DISCLAIMER)
    );
}

#[tokio::test]
async fn dosage_question_is_rejected_with_client_error() {
    let (status, source, body) = send(
        rules_only_app(),
        chat_request(json!({ "message": "what dose of ibuprofen mg should I take" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(source, None);
    assert_eq!(
        body,
        json!({ "error": SAFETY_REJECTION_ERROR, "message": SAFETY_REJECTION_MESSAGE })
    );
}

#[tokio::test]
async fn hello_returns_canned_greeting() {
    let (status, source, body) =
        send(rules_only_app(), chat_request(json!({ "message": "hello" }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("canned"));
    assert_eq!(body["red_flags"], json!(["None at this moment"]));
    assert!(body["next_steps"].as_str().unwrap().ends_with(DISCLAIMER));
}

#[tokio::test]
async fn knee_pain_returns_augmented_default() {
    let (status, _, body) = send(
        rules_only_app(),
        chat_request(json!({ "message": "my knee hurts after running" })),
    )
    .await;

    let store = TemplateStore::standard();
    let default = store.lookup(IntentKey::Default).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["causes"], default.causes.as_str());
    assert_eq!(body["red_flags"], json!(default.red_flags));
    assert!(body["next_steps"].as_str().unwrap().ends_with(DISCLAIMER));
}

#[tokio::test]
async fn missing_or_blank_message_is_rejected() {
    for payload in [json!({}), json!({ "message": "" }), json!({ "message": "   " })] {
        let (status, _, body) = send(rules_only_app(), chat_request(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Message is required" }));
    }
}

#[tokio::test]
async fn non_json_body_is_rejected() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "text/plain")
        .body(Body::from("fever"))
        .unwrap();

    let (status, _, body) = send(rules_only_app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message is required");
}

#[tokio::test]
async fn identical_requests_return_identical_payloads() {
    let app = rules_only_app();
    let (_, _, first) = send(
        app.clone(),
        chat_request(json!({ "message": "cough and sneezing" })),
    )
    .await;
    let (_, _, second) = send(app, chat_request(json!({ "message": "cough and sneezing" }))).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn rate_limit_applies_per_client() {
    let config = ApiConfig {
        rate_limit_max: 1,
        ..ApiConfig::default()
    };
    let app = build_app(&config).unwrap();

    let first = app
        .clone()
        .oneshot(chat_request(json!({ "message": "hello" })))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(chat_request(json!({ "message": "hello" })))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().get("retry-after").is_some());
}

#[tokio::test]
async fn rate_limited_response_keeps_cors_and_security_headers() {
    let config = ApiConfig {
        rate_limit_max: 1,
        ..ApiConfig::default()
    };
    let app = build_app(&config).unwrap();
    let request = || {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .header("origin", "https://triage.example")
            .body(Body::from(json!({ "message": "hello" }).to_string()))
            .unwrap()
    };

    app.clone().oneshot(request()).await.unwrap();
    let limited = app.oneshot(request()).await.unwrap();

    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        limited.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    assert_eq!(limited.headers().get("x-content-type-options").unwrap(), "nosniff");
}

#[tokio::test]
async fn oversized_body_gets_json_413() {
    let body = json!({ "message": "a".repeat(20 * 1024) }).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .header("origin", "https://triage.example")
        .body(Body::from(body))
        .unwrap();

    let response = rules_only_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(response.headers().get("access-control-allow-origin").is_some());

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed["error"], "payload_too_large");
}

#[tokio::test]
async fn external_model_content_is_used_with_disclaimer() {
    let advice = json!({
        "causes": "Seasonal allergies are a common cause.",
        "medicine_categories": ["antihistamine"],
        "home_remedies": ["Rinse nasal passages with saline"],
        "red_flags": ["Swelling of lips or tongue"],
        "next_steps": "Talk to a pharmacist about allergy relief."
    });
    let addr = spawn_model_server(
        StatusCode::OK,
        json!({ "output_text": format!("```json\n{advice}\n```") }),
    )
    .await;

    let app = app_with_model(addr);
    let (status, source, body) =
        send(app.clone(), chat_request(json!({ "message": "itchy eyes" }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("external"));
    assert_eq!(body["causes"], "Seasonal allergies are a common cause.");
    assert_eq!(
        body["next_steps"],
        format!("Talk to a pharmacist about allergy relief.{DISCLAIMER}")
    );

    let (_, _, health) = send(
        app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(health["capabilities"]["ai_fallback"], true);
    assert_eq!(health["metrics"]["external_success_total"], 1);
}

#[tokio::test]
async fn external_model_still_sits_behind_safety_filter() {
    let addr = spawn_model_server(StatusCode::OK, json!({ "output_text": "{}" })).await;

    let (status, _, body) = send(
        app_with_model(addr),
        chat_request(json!({ "message": "I'm pregnant, can I take this?" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], SAFETY_REJECTION_ERROR);
}

#[tokio::test]
async fn external_model_failures_fall_back_to_rules() {
    let expected = send(
        rules_only_app(),
        chat_request(json!({ "message": "I have a fever and headache" })),
    )
    .await
    .2;

    let server_error =
        spawn_model_server(StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "boom" })).await;
    let prose = spawn_model_server(
        StatusCode::OK,
        json!({ "output_text": "You should rest and drink water." }),
    )
    .await;
    let wrong_shape = spawn_model_server(
        StatusCode::OK,
        json!({ "output_text": "{\"advice\": \"rest\"}" }),
    )
    .await;

    for addr in [server_error, prose, wrong_shape] {
        let (status, source, body) = send(
            app_with_model(addr),
            chat_request(json!({ "message": "I have a fever and headache" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(source.as_deref(), Some("template"));
        assert_eq!(body, expected);
    }
}

#[tokio::test]
async fn unreachable_model_falls_back_to_rules() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (status, source, body) =
        send(app_with_model(addr), chat_request(json!({ "message": "hello" }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("canned"));
    assert_eq!(body["red_flags"], json!(["None at this moment"]));
}
