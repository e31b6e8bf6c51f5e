use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKey {
    Fever,
    Headache,
    Cold,
    Stomach,
    Default,
}

impl IntentKey {
    pub const ALL: [IntentKey; 5] = [
        Self::Fever,
        Self::Headache,
        Self::Cold,
        Self::Stomach,
        Self::Default,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fever => "fever",
            Self::Headache => "headache",
            Self::Cold => "cold",
            Self::Stomach => "stomach",
            Self::Default => "default",
        }
    }
}

impl std::fmt::Display for IntentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversational replies that bypass the template store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CannedReply {
    Greeting,
    Help,
    Wellbeing,
    Thanks,
    Farewell,
}

/// Contextual rewrites of the `default` template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Augmentation {
    Fatigue,
    Pain,
    GeneralInquiry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    Canned {
        reply: CannedReply,
    },
    Template {
        key: IntentKey,
        augmentation: Option<Augmentation>,
    },
}

impl Classification {
    pub fn template(key: IntentKey) -> Self {
        Self::Template {
            key,
            augmentation: None,
        }
    }

    pub fn augmented(augmentation: Augmentation) -> Self {
        Self::Template {
            key: IntentKey::Default,
            augmentation: Some(augmentation),
        }
    }

    pub fn canned(reply: CannedReply) -> Self {
        Self::Canned { reply }
    }

    /// Template key this classification reads from, if any.
    pub fn intent_key(&self) -> Option<IntentKey> {
        match self {
            Self::Template { key, .. } => Some(*key),
            Self::Canned { .. } => None,
        }
    }
}

/// Stored advice for one intent, before the disclaimer is attached.
///
/// The same shape is what the external model is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseTemplate {
    pub causes: String,
    pub medicine_categories: Vec<String>,
    pub home_remedies: Vec<String>,
    pub red_flags: Vec<String>,
    pub next_steps: String,
}

impl ResponseTemplate {
    /// Name of the first empty field, if any.
    pub fn first_empty_field(&self) -> Option<&'static str> {
        fn blank_list(items: &[String]) -> bool {
            items.is_empty() || items.iter().all(|item| item.trim().is_empty())
        }

        if self.causes.trim().is_empty() {
            Some("causes")
        } else if blank_list(&self.medicine_categories) {
            Some("medicine_categories")
        } else if blank_list(&self.home_remedies) {
            Some("home_remedies")
        } else if blank_list(&self.red_flags) {
            Some("red_flags")
        } else if self.next_steps.trim().is_empty() {
            Some("next_steps")
        } else {
            None
        }
    }
}

/// The payload delivered to callers. `next_steps` always ends with the disclaimer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryResponse {
    pub causes: String,
    pub medicine_categories: Vec<String>,
    pub home_remedies: Vec<String>,
    pub red_flags: Vec<String>,
    pub next_steps: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyRejection {
    pub error: String,
    pub message: String,
}
