use std::time::Duration;

use anyhow::Result;
use triage_api::{build_router, build_state, ApiConfig};
use triage_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("triage_api");

    let config = ApiConfig::from_env();
    let state = build_state(&config)?;

    let limiter = state.limiter.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(300));
        loop {
            ticker.tick().await;
            limiter.prune();
        }
    });

    tracing::info!(
        ai_fallback = state.pipeline.ai_enabled(),
        "triage pipeline ready"
    );
    let app = build_router(state, config.body_limit_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!(bind = %config.bind, "symptom triage api started");

    axum::serve(listener, app).await?;
    Ok(())
}
