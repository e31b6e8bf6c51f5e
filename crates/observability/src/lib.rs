use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Process-wide counters. Each increment is mirrored into the `metrics` facade.
///
/// The binaries install no recorder, so facade calls are no-ops unless an embedding
/// host installs one. `/health` reads the atomic snapshot instead.
#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    blocked_total: AtomicU64,
    canned_total: AtomicU64,
    templated_total: AtomicU64,
    external_attempts_total: AtomicU64,
    external_success_total: AtomicU64,
    external_fallback_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub blocked_total: u64,
    pub canned_total: u64,
    pub templated_total: u64,
    pub external_attempts_total: u64,
    pub external_success_total: u64,
    pub external_fallback_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("triage_requests_total").increment(1);
    }

    pub fn inc_blocked(&self) {
        self.blocked_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("triage_blocked_total").increment(1);
    }

    pub fn inc_canned(&self) {
        self.canned_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("triage_canned_total").increment(1);
    }

    pub fn inc_templated(&self) {
        self.templated_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("triage_templated_total").increment(1);
    }

    pub fn inc_external_attempt(&self) {
        self.external_attempts_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("triage_external_attempts_total").increment(1);
    }

    pub fn inc_external_success(&self) {
        self.external_success_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("triage_external_success_total").increment(1);
    }

    pub fn inc_external_fallback(&self, reason: &'static str) {
        self.external_fallback_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("triage_external_fallback_total", "reason" => reason).increment(1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        metrics::histogram!("triage_request_latency_seconds").record(duration.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            blocked_total: self.blocked_total.load(Ordering::Relaxed),
            canned_total: self.canned_total.load(Ordering::Relaxed),
            templated_total: self.templated_total.load(Ordering::Relaxed),
            external_attempts_total: self.external_attempts_total.load(Ordering::Relaxed),
            external_success_total: self.external_success_total.load(Ordering::Relaxed),
            external_fallback_total: self.external_fallback_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,triage_api=info,triage_agents=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}

/// Human-readable logs on stderr so command output on stdout stays parseable.
pub fn init_cli_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{}=info,triage_agents=warn", service_name)));

        tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    });
}
