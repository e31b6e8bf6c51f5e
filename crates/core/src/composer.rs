use crate::error::CoreError;
use crate::models::{AdvisoryResponse, Classification, ResponseTemplate};
use crate::templates::{canned_reply, TemplateStore};

pub const DISCLAIMER: &str = "\n\nDISCLAIMER: This advice is for educational purposes only and is not a substitute for professional medical advice, diagnosis, or treatment. Always seek the advice of your physician or other qualified health provider with any questions you may have regarding a medical condition. Our conversation is meant to enhance your health literacy, but professional medical decisions should always involve qualified healthcare providers.";

/// Copies `template` into an outbound response with the disclaimer appended.
pub fn compose(template: &ResponseTemplate) -> AdvisoryResponse {
    AdvisoryResponse {
        causes: template.causes.clone(),
        medicine_categories: template.medicine_categories.clone(),
        home_remedies: template.home_remedies.clone(),
        red_flags: template.red_flags.clone(),
        next_steps: format!("{}{}", template.next_steps, DISCLAIMER),
    }
}

/// Deterministic path from a classification to a finished response.
pub fn resolve(
    classification: &Classification,
    store: &TemplateStore,
) -> Result<AdvisoryResponse, CoreError> {
    let response = match *classification {
        Classification::Canned { reply } => compose(&canned_reply(reply)),
        Classification::Template {
            key,
            augmentation: None,
        } => compose(store.lookup(key)?),
        Classification::Template {
            key,
            augmentation: Some(augmentation),
        } => compose(&augmentation.apply(store.lookup(key)?)),
    };
    Ok(response)
}
