use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use triage_agents::{OpenAiRuntimeConfig, DEFAULT_EXTERNAL_TIMEOUT};
use triage_core::{SafetyFilter, TemplateStore};

const MIN_EXTERNAL_TIMEOUT_SECONDS: u64 = 1;
const MAX_EXTERNAL_TIMEOUT_SECONDS: u64 = 120;

/// Startup settings. `Default` is the rules-only configuration used by tests.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind: String,
    pub openai: Option<OpenAiRuntimeConfig>,
    pub external_timeout: Duration,
    pub templates_path: Option<PathBuf>,
    pub extra_safety_markers: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    pub body_limit_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            openai: None,
            external_timeout: DEFAULT_EXTERNAL_TIMEOUT,
            templates_path: None,
            extra_safety_markers: Vec::new(),
            allowed_origins: Vec::new(),
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max: 60,
            body_limit_bytes: 16 * 1024,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind: env::var("TRIAGE_BIND").unwrap_or(defaults.bind),
            openai: build_openai_runtime_config(),
            external_timeout: env::var("TRIAGE_EXTERNAL_TIMEOUT_SECONDS")
                .ok()
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(|value| {
                    Duration::from_secs(
                        value.clamp(MIN_EXTERNAL_TIMEOUT_SECONDS, MAX_EXTERNAL_TIMEOUT_SECONDS),
                    )
                })
                .unwrap_or(defaults.external_timeout),
            templates_path: non_empty_var("TRIAGE_TEMPLATES_PATH").map(PathBuf::from),
            extra_safety_markers: non_empty_var("TRIAGE_EXTRA_SAFETY_MARKERS")
                .map(|value| split_list(&value))
                .unwrap_or_default(),
            allowed_origins: non_empty_var("TRIAGE_ALLOWED_ORIGINS")
                .map(|value| {
                    split_list(&value)
                        .into_iter()
                        .map(|origin| origin.trim_end_matches('/').to_string())
                        .collect()
                })
                .unwrap_or_default(),
            rate_limit_window: Duration::from_secs(
                env::var("TRIAGE_RATE_LIMIT_WINDOW_SECONDS")
                    .ok()
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(60),
            ),
            rate_limit_max: env::var("TRIAGE_RATE_LIMIT_MAX")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(defaults.rate_limit_max),
            body_limit_bytes: defaults.body_limit_bytes,
        }
    }

    pub fn safety_filter(&self) -> SafetyFilter {
        SafetyFilter::with_extra_markers(&self.extra_safety_markers)
    }

    pub fn template_store(&self) -> Result<TemplateStore> {
        let Some(path) = self.templates_path.as_ref() else {
            return Ok(TemplateStore::standard());
        };

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading templates from {}", path.display()))?;
        TemplateStore::from_json_str(&raw)
            .with_context(|| format!("invalid template file {}", path.display()))
    }
}

fn build_openai_runtime_config() -> Option<OpenAiRuntimeConfig> {
    let api_key = non_empty_var("TRIAGE_OPENAI_API_KEY")?;
    let mut runtime = OpenAiRuntimeConfig::new(api_key);
    if let Some(model) = non_empty_var("TRIAGE_OPENAI_MODEL") {
        runtime = runtime.with_model(model);
    }
    if let Some(base_url) = non_empty_var("TRIAGE_OPENAI_BASE_URL") {
        runtime = runtime.with_base_url(base_url);
    }
    Some(runtime)
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
