pub mod composer;
pub mod error;
pub mod intent;
pub mod models;
pub mod safety;
pub mod templates;

pub use composer::{compose, resolve, DISCLAIMER};
pub use error::CoreError;
pub use intent::{normalize_text, IntentClassifier, IntentRule};
pub use models::*;
pub use safety::{SafetyFilter, SAFETY_REJECTION_ERROR, SAFETY_REJECTION_MESSAGE};
pub use templates::{canned_reply, TemplateStore};
