mod config;
mod rate_limit;

use std::any::Any;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use triage_agents::{ChatOutcome, OpenAiAdvisor, PipelineError, RequestPipeline};
use triage_observability::{AppMetrics, MetricsSnapshot};

pub use crate::config::ApiConfig;
pub use crate::rate_limit::{ClientRateLimiter, RateDecision};

const MESSAGE_REQUIRED: &str = "Message is required";
const INTERNAL_ERROR: &str = "Internal server error";
const INTERNAL_ERROR_MESSAGE: &str =
    "An error occurred while processing your request. Please try again.";

#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<RequestPipeline<OpenAiAdvisor>>,
    pub metrics: Arc<AppMetrics>,
    pub limiter: ClientRateLimiter,
    pub allowed_origins: Arc<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    capabilities: HealthCapabilities,
}

#[derive(Debug, Serialize)]
struct HealthCapabilities {
    ai_fallback: bool,
    ai_model: Option<String>,
}

pub fn build_state(config: &ApiConfig) -> Result<ApiState> {
    let metrics = AppMetrics::shared();
    let pipeline = RequestPipeline::standard(
        config.safety_filter(),
        config.template_store()?,
        config.openai.clone(),
        config.external_timeout,
        metrics.clone(),
    )?;

    Ok(ApiState {
        pipeline: Arc::new(pipeline),
        metrics,
        limiter: ClientRateLimiter::new(config.rate_limit_window, config.rate_limit_max),
        allowed_origins: Arc::new(config.allowed_origins.clone()),
    })
}

pub fn build_app(config: &ApiConfig) -> Result<Router> {
    let state = build_state(config)?;
    info!(
        ai_fallback = state.pipeline.ai_enabled(),
        templates = state.pipeline.templates().keys().len(),
        rules = state.pipeline.classifier().rules().len(),
        "triage pipeline ready"
    );
    Ok(build_router(state, config.body_limit_bytes))
}

pub fn build_router(state: ApiState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(body_limit_bytes))
        .layer(middleware::from_fn(payload_too_large_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(build_cors_layer(&state.allowed_origins))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "OK",
        message: "Server is running",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        capabilities: HealthCapabilities {
            ai_fallback: state.pipeline.ai_enabled(),
            ai_model: state
                .pipeline
                .advisor()
                .map(|advisor| advisor.model().to_string()),
        },
    };
    (StatusCode::OK, Json(payload))
}

async fn chat(
    State(state): State<ApiState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let message = match payload {
        Ok(Json(ChatRequest {
            message: Some(message),
        })) => message,
        _ => return message_required(),
    };

    chat_response(state.pipeline.handle(&message).await)
}

fn chat_response(result: Result<ChatOutcome, PipelineError>) -> Response {
    match result {
        Ok(ChatOutcome::Delivered(delivery)) => {
            let mut response = (StatusCode::OK, Json(delivery.response)).into_response();
            response.headers_mut().insert(
                header::HeaderName::from_static("x-advice-source"),
                HeaderValue::from_static(delivery.source.label()),
            );
            response
        }
        Ok(ChatOutcome::Blocked(rejection)) => {
            (StatusCode::BAD_REQUEST, Json(rejection)).into_response()
        }
        Err(PipelineError::InputMissing) => message_required(),
        Err(error) => {
            error!(error = %error, "chat pipeline failed");
            internal_error()
        }
    }
}

fn message_required() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": MESSAGE_REQUIRED })),
    )
        .into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "error": INTERNAL_ERROR,
            "message": INTERNAL_ERROR_MESSAGE
        })),
    )
        .into_response()
}

/// Rewrites the body limit's plain-text 413 into the JSON error shape.
async fn payload_too_large_middleware(request: Request<Body>, next: Next) -> Response {
    let response = next.run(request).await;
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return response;
    }

    (
        StatusCode::PAYLOAD_TOO_LARGE,
        Json(serde_json::json!({
            "error": "payload_too_large",
            "message": "request body exceeds the size limit"
        })),
    )
        .into_response()
}

fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response<String> {
    error!("request handler panicked");
    let body = serde_json::json!({
        "error": INTERNAL_ERROR,
        "message": INTERNAL_ERROR_MESSAGE
    })
    .to_string();

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    match state.limiter.check(&ip) {
        RateDecision::Allowed => next.run(request).await,
        RateDecision::Limited { retry_after } => {
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "rate_limited",
                    "message": "rate limit exceeded for this IP"
                })),
            )
                .into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(
        header::HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    response
}
