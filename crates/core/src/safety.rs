use crate::models::SafetyRejection;

pub const STANDARD_SAFETY_MARKERS: &[&str] = &[
    "prescription",
    "dose",
    "mg",
    "milligram",
    "injection",
    "inject",
    "pregnancy",
    "pregnant",
    "breastfeeding",
    "nursing",
    "doctor prescription",
    "specific medication",
    "brand name",
    "exact dosage",
];

pub const SAFETY_REJECTION_ERROR: &str = "Request blocked for safety reasons";
pub const SAFETY_REJECTION_MESSAGE: &str = "I cannot provide prescriptions, specific dosages, or medical advice requiring professional evaluation. Please consult a healthcare provider for personalized medical advice.";

/// Coarse substring gate for requests that need professional judgment.
///
/// Any marker anywhere in the text blocks, regardless of the words around it.
/// False positives ("omg" contains "mg") are accepted.
#[derive(Debug, Clone)]
pub struct SafetyFilter {
    markers: Vec<String>,
}

impl Default for SafetyFilter {
    fn default() -> Self {
        Self {
            markers: STANDARD_SAFETY_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
        }
    }
}

impl SafetyFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard markers plus operator-supplied ones. The standard set is never reduced.
    pub fn with_extra_markers<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::default();
        for marker in extra {
            let marker = marker.as_ref().trim().to_lowercase();
            if !marker.is_empty() && !filter.markers.contains(&marker) {
                filter.markers.push(marker);
            }
        }
        filter
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    pub fn is_unsafe(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        contains_any(&lower, &self.markers)
    }

    pub fn rejection(&self) -> SafetyRejection {
        SafetyRejection {
            error: SAFETY_REJECTION_ERROR.to_string(),
            message: SAFETY_REJECTION_MESSAGE.to_string(),
        }
    }
}

fn contains_any(input: &str, needles: &[String]) -> bool {
    needles.iter().any(|needle| input.contains(needle.as_str()))
}
