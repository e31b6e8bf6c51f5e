use thiserror::Error;

use crate::models::IntentKey;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no template registered for intent `{0}`")]
    ClassifierStoreMismatch(IntentKey),

    #[error("template store has no `default` entry")]
    MissingDefaultTemplate,

    #[error("template `{key}` has an empty `{field}` field")]
    EmptyTemplateField {
        key: IntentKey,
        field: &'static str,
    },

    #[error("template file could not be parsed: {0}")]
    TemplateParse(#[from] serde_json::Error),
}
