use std::time::Duration;

use thiserror::Error;
use triage_core::ResponseTemplate;

/// Instruction sent alongside every message to the external model.
pub const SYSTEM_INSTRUCTION: &str = "You are a cautious medical assistant. \
Return advice as a single JSON object with exactly these fields: \
\"causes\" (string), \"medicine_categories\" (array of strings), \"home_remedies\" (array of strings), \
\"red_flags\" (array of strings), \"next_steps\" (string). \
Never give prescriptions, doses, mg amounts, or medical brand specifics. \
Only return general OTC categories and self-care tips. \
Always advise professional consultation in next_steps.";

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("external model is not configured")]
    Unavailable,

    #[error("external model request failed: {0}")]
    Transport(String),

    #[error("external model returned status {0}")]
    Status(u16),

    #[error("external model timed out after {0:?}")]
    TimedOut(Duration),

    #[error("external model returned unusable content: {0}")]
    Malformed(String),
}

impl AdvisorError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Transport(_) => "transport",
            Self::Status(_) => "status",
            Self::TimedOut(_) => "timed_out",
            Self::Malformed(_) => "malformed",
        }
    }
}

/// Optional generative source of pre-shaped advice.
///
/// Implementations return content without the disclaimer; the pipeline adds it.
pub trait ExternalAdvisor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn try_external(&self, text: &str) -> Result<ResponseTemplate, AdvisorError>;
}

/// Parses model output into the five-field shape.
///
/// Accepts a bare object or one wrapped in a Markdown code fence.
pub fn parse_advice(content: &str) -> Result<ResponseTemplate, AdvisorError> {
    let trimmed = content.trim();
    let start = trimmed
        .find('{')
        .ok_or_else(|| AdvisorError::Malformed("no JSON object in output".to_string()))?;
    let end = trimmed
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| AdvisorError::Malformed("unterminated JSON object".to_string()))?;

    let draft: ResponseTemplate = serde_json::from_str(&trimmed[start..=end])
        .map_err(|error| AdvisorError::Malformed(error.to_string()))?;

    ensure_complete(draft)
}

pub(crate) fn ensure_complete(draft: ResponseTemplate) -> Result<ResponseTemplate, AdvisorError> {
    match draft.first_empty_field() {
        Some(field) => Err(AdvisorError::Malformed(format!("empty `{field}` field"))),
        None => Ok(draft),
    }
}
