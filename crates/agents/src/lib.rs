mod advisor;
mod openai;

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use triage_core::{
    compose, resolve, AdvisoryResponse, Classification, CoreError, IntentClassifier,
    ResponseTemplate, SafetyFilter, SafetyRejection, TemplateStore,
};
use triage_observability::AppMetrics;

use crate::advisor::ensure_complete;

pub use advisor::{parse_advice, AdvisorError, ExternalAdvisor, SYSTEM_INSTRUCTION};
pub use openai::{
    OpenAiAdvisor, OpenAiRuntimeConfig, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL,
};

pub const DEFAULT_EXTERNAL_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("message text is required")]
    InputMissing,

    #[error(transparent)]
    Core(#[from] CoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    External,
    Classified { classification: Classification },
}

impl ResponseSource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::External => "external",
            Self::Classified {
                classification: Classification::Canned { .. },
            } => "canned",
            Self::Classified {
                classification: Classification::Template { .. },
            } => "template",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub response: AdvisoryResponse,
    pub source: ResponseSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Delivered(Delivery),
    Blocked(SafetyRejection),
}

/// Safety gate, optional external attempt, then the deterministic rules.
///
/// Holds no per-request state; clones share the read-only rule list and store.
pub struct RequestPipeline<A> {
    safety: SafetyFilter,
    classifier: Arc<IntentClassifier>,
    templates: Arc<TemplateStore>,
    advisor: Option<Arc<A>>,
    external_timeout: Duration,
    metrics: Arc<AppMetrics>,
}

impl<A> Clone for RequestPipeline<A> {
    fn clone(&self) -> Self {
        Self {
            safety: self.safety.clone(),
            classifier: self.classifier.clone(),
            templates: self.templates.clone(),
            advisor: self.advisor.clone(),
            external_timeout: self.external_timeout,
            metrics: self.metrics.clone(),
        }
    }
}

impl<A> RequestPipeline<A>
where
    A: ExternalAdvisor,
{
    /// Deterministic pipeline. Fails if a rule targets a key the store lacks.
    pub fn new(
        safety: SafetyFilter,
        classifier: IntentClassifier,
        templates: TemplateStore,
        metrics: Arc<AppMetrics>,
    ) -> Result<Self, CoreError> {
        templates.ensure_covers(&classifier)?;

        Ok(Self {
            safety,
            classifier: Arc::new(classifier),
            templates: Arc::new(templates),
            advisor: None,
            external_timeout: DEFAULT_EXTERNAL_TIMEOUT,
            metrics,
        })
    }

    pub fn with_advisor(mut self, advisor: A, timeout: Duration) -> Self {
        self.advisor = Some(Arc::new(advisor));
        self.external_timeout = timeout;
        self
    }

    pub fn ai_enabled(&self) -> bool {
        self.advisor.is_some()
    }

    pub fn advisor(&self) -> Option<&A> {
        self.advisor.as_deref()
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    #[instrument(skip(self, text), fields(bytes = text.len()))]
    pub async fn handle(&self, text: &str) -> Result<ChatOutcome, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::InputMissing);
        }

        let started = Instant::now();
        self.metrics.inc_request();
        let outcome = self.dispatch(text).await;
        self.metrics.observe_latency(started.elapsed());
        outcome
    }

    async fn dispatch(&self, text: &str) -> Result<ChatOutcome, PipelineError> {
        if self.safety.is_unsafe(text) {
            self.metrics.inc_blocked();
            info!("request blocked by safety filter");
            return Ok(ChatOutcome::Blocked(self.safety.rejection()));
        }

        let delivery = match self.attempt_external(text).await {
            Ok(draft) => {
                self.metrics.inc_external_success();
                Delivery {
                    response: compose(&draft),
                    source: ResponseSource::External,
                }
            }
            Err(AdvisorError::Unavailable) => self.respond_deterministic(text)?,
            Err(error) => {
                warn!(
                    kind = error.kind(),
                    error = %error,
                    "external model failed, falling back to rules"
                );
                self.metrics.inc_external_fallback(error.kind());
                self.respond_deterministic(text)?
            }
        };

        info!(source = delivery.source.label(), "chat handled");
        Ok(ChatOutcome::Delivered(delivery))
    }

    /// Classifier → store → composer, with no safety gate and no external call.
    pub fn respond_deterministic(&self, text: &str) -> Result<Delivery, PipelineError> {
        let classification = self.classifier.classify(text);
        debug!(?classification, "classified");

        match classification {
            Classification::Canned { .. } => self.metrics.inc_canned(),
            Classification::Template { .. } => self.metrics.inc_templated(),
        }

        Ok(Delivery {
            response: resolve(&classification, &self.templates)?,
            source: ResponseSource::Classified { classification },
        })
    }

    async fn attempt_external(&self, text: &str) -> Result<ResponseTemplate, AdvisorError> {
        let Some(advisor) = self.advisor.as_ref() else {
            return Err(AdvisorError::Unavailable);
        };

        self.metrics.inc_external_attempt();
        debug!(advisor = advisor.name(), "attempting external model");

        let draft = tokio::time::timeout(self.external_timeout, advisor.try_external(text))
            .await
            .map_err(|_| AdvisorError::TimedOut(self.external_timeout))??;

        ensure_complete(draft)
    }
}

impl RequestPipeline<OpenAiAdvisor> {
    /// Standard rules and filter, with the OpenAI adapter when a runtime is supplied.
    pub fn standard(
        safety: SafetyFilter,
        templates: TemplateStore,
        openai: Option<OpenAiRuntimeConfig>,
        external_timeout: Duration,
        metrics: Arc<AppMetrics>,
    ) -> anyhow::Result<Self> {
        let pipeline = Self::new(safety, IntentClassifier::standard(), templates, metrics)?;

        match openai {
            Some(runtime) => {
                let advisor = OpenAiAdvisor::new(runtime, external_timeout)?;
                info!(model = advisor.model(), "external model fallback enabled");
                Ok(pipeline.with_advisor(advisor, external_timeout))
            }
            None => {
                info!("external model not configured, rules only");
                Ok(pipeline)
            }
        }
    }
}
