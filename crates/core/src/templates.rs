use std::collections::HashMap;

use crate::error::CoreError;
use crate::intent::IntentClassifier;
use crate::models::{Augmentation, CannedReply, IntentKey, ResponseTemplate};

/// Read-only intent → template map, built once at startup.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    templates: HashMap<IntentKey, ResponseTemplate>,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::standard()
    }
}

impl TemplateStore {
    pub fn standard() -> Self {
        let templates = IntentKey::ALL
            .into_iter()
            .map(|key| (key, standard_template(key)))
            .collect();
        Self { templates }
    }

    /// Builds a store from operator-supplied JSON keyed by intent name.
    ///
    /// Every entry must have all five fields non-empty and `default` must be present.
    pub fn from_json_str(raw: &str) -> Result<Self, CoreError> {
        let templates: HashMap<IntentKey, ResponseTemplate> = serde_json::from_str(raw)?;
        Self::from_templates(templates)
    }

    pub fn from_templates(templates: HashMap<IntentKey, ResponseTemplate>) -> Result<Self, CoreError> {
        if !templates.contains_key(&IntentKey::Default) {
            return Err(CoreError::MissingDefaultTemplate);
        }
        for (key, template) in &templates {
            if let Some(field) = template.first_empty_field() {
                return Err(CoreError::EmptyTemplateField { key: *key, field });
            }
        }
        Ok(Self { templates })
    }

    pub fn lookup(&self, key: IntentKey) -> Result<&ResponseTemplate, CoreError> {
        let found = self.templates.get(&key);
        debug_assert!(found.is_some(), "classifier produced `{key}` with no template");
        found.ok_or(CoreError::ClassifierStoreMismatch(key))
    }

    /// Startup check that every key the classifier can emit resolves here.
    pub fn ensure_covers(&self, classifier: &IntentClassifier) -> Result<(), CoreError> {
        match classifier
            .reachable_keys()
            .into_iter()
            .find(|key| !self.templates.contains_key(key))
        {
            Some(missing) => Err(CoreError::ClassifierStoreMismatch(missing)),
            None => Ok(()),
        }
    }

    pub fn keys(&self) -> Vec<IntentKey> {
        let mut keys = self.templates.keys().copied().collect::<Vec<_>>();
        keys.sort();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (IntentKey, &ResponseTemplate)> {
        let mut entries = self
            .templates
            .iter()
            .map(|(key, template)| (*key, template))
            .collect::<Vec<_>>();
        entries.sort_by_key(|(key, _)| *key);
        entries.into_iter()
    }
}

impl Augmentation {
    /// Fresh copy of `base` with the augmentation's causes and next steps.
    pub fn apply(self, base: &ResponseTemplate) -> ResponseTemplate {
        let (causes, next_steps) = match self {
            Self::Fatigue => (
                "Feeling tired or run down is often linked to poor sleep, stress, dehydration, low iron, or the early stage of an infection.",
                "Keep a regular sleep schedule, drink enough water, and eat balanced meals. Consult a doctor if the tiredness lasts more than two weeks or comes with weight loss, fever, or shortness of breath.",
            ),
            Self::Pain => (
                "Pain without a clear cause is commonly due to muscle strain, overuse, minor injury, or inflammation in the affected area.",
                "Rest the painful area and avoid activities that make it worse. A cold pack in the first two days and gentle movement afterwards often help. See a healthcare provider if the pain is severe, follows an injury, or lasts more than a few days.",
            ),
            Self::GeneralInquiry => (
                "I can share general, educational information about common symptoms such as fever, headaches, colds, stomach upsets, tiredness, and everyday aches.",
                "Describe the symptom you are curious about, how long it has lasted, and what makes it better or worse, and I will share general information about it.",
            ),
        };

        ResponseTemplate {
            causes: causes.to_string(),
            next_steps: next_steps.to_string(),
            ..base.clone()
        }
    }
}

pub fn canned_reply(reply: CannedReply) -> ResponseTemplate {
    let (causes, home_remedies, next_steps): (&str, [&str; 3], &str) = match reply {
        CannedReply::Greeting => (
            "Hello there! I'm glad you reached out. I'm here to assist you with health information in a safe and informative way.",
            [
                "Welcome to our health conversation",
                "Share your concerns openly",
                "Ask questions freely",
            ],
            "Tell me about what's been bothering you lately. For example, you might say 'I've been having some troubling symptoms' or 'I'd like to know about this pain I've been experiencing.'",
        ),
        CannedReply::Help => (
            "I'm here to help you understand health information better. My role is to provide educational insights about symptoms and general wellness.",
            [
                "Share your health concerns",
                "Learn about symptoms",
                "Understand wellness options",
            ],
            "Please describe your health concerns in more detail. For example, you can tell me about specific symptoms you're experiencing, when they started, or what makes them better or worse.",
        ),
        CannedReply::Wellbeing => (
            "I'm doing well, thank you for asking! I'm ready to help you with any health questions you might have.",
            [
                "Check in with how you are feeling",
                "Note any symptoms you have noticed",
                "Ask about anything on your mind",
            ],
            "How are you feeling today? If something is bothering you, describe your symptoms and I'll share general information about them.",
        ),
        CannedReply::Thanks => (
            "You're very welcome! I'm glad I could help you with health information.",
            [
                "Keep taking care of yourself",
                "Stay hydrated and rested",
                "Come back anytime with questions",
            ],
            "If you have any other symptoms or health questions, feel free to ask. Remember to consult a healthcare provider for personal medical concerns.",
        ),
        CannedReply::Farewell => (
            "Thank you for this health conversation! Take good care of yourself.",
            [
                "Rest well",
                "Stay hydrated",
                "Listen to your body",
            ],
            "Goodbye for now. If new symptoms appear or current ones get worse, reach out to a healthcare provider.",
        ),
    };

    ResponseTemplate {
        causes: causes.to_string(),
        medicine_categories: vec!["none needed".to_string()],
        home_remedies: strings(&home_remedies),
        red_flags: vec!["None at this moment".to_string()],
        next_steps: next_steps.to_string(),
    }
}

fn standard_template(key: IntentKey) -> ResponseTemplate {
    match key {
        IntentKey::Fever => template(
            "Fever is commonly caused by infections (viral or bacterial), inflammation, or immune responses.",
            &["pain reliever", "fever reducer"],
            &[
                "Stay hydrated by drinking plenty of fluids",
                "Rest and avoid strenuous activities",
                "Use a cool compress on forehead",
            ],
            &[
                "Temperature above 103°F (39.4°C)",
                "Severe headache or stiff neck",
                "Difficulty breathing",
                "Persistent vomiting",
            ],
            "Monitor temperature regularly. Consult a doctor if fever persists for more than 3 days or if severe symptoms develop.",
        ),
        IntentKey::Headache => template(
            "Headaches can be caused by stress, dehydration, eye strain, lack of sleep, or sinus congestion.",
            &["pain reliever", "anti-inflammatory"],
            &[
                "Apply a cold or warm compress to head/neck",
                "Ensure adequate hydration",
                "Rest in a dark, quiet room",
            ],
            &[
                "Sudden, severe headache unlike any before",
                "Headache with fever, stiff neck, confusion",
                "Headache after a head injury",
            ],
            "Most headaches resolve with rest. See a doctor for recurring severe headaches or those accompanied by neurological symptoms.",
        ),
        IntentKey::Cold => template(
            "Common cold is caused by viruses, most commonly rhinoviruses, affecting the upper respiratory tract.",
            &["decongestant", "cough suppressant", "throat lozenge"],
            &[
                "Drink warm liquids like tea with honey",
                "Gargle with warm salt water",
                "Use a humidifier or breathe steam",
            ],
            &[
                "High fever lasting more than 3 days",
                "Severe sinus pain",
                "Difficulty breathing or chest pain",
            ],
            "Cold symptoms typically resolve in 7-10 days. Seek medical care if symptoms worsen or persist beyond 10 days.",
        ),
        IntentKey::Stomach => template(
            "Stomach discomfort can be due to indigestion, food intolerance, gastritis, or gastrointestinal infections.",
            &["antacid", "anti-nausea", "digestive aid"],
            &[
                "Eat bland foods like crackers or toast",
                "Stay hydrated with small sips of water",
                "Avoid spicy, fatty, or acidic foods",
            ],
            &[
                "Severe abdominal pain",
                "Persistent vomiting or diarrhea",
                "Blood in vomit or stool",
                "Signs of dehydration",
            ],
            "Minor stomach issues often resolve with diet adjustments. Consult a doctor for persistent symptoms or signs of dehydration.",
        ),
        IntentKey::Default => template(
            "I'm not familiar with those specific symptoms. They could be related to various conditions.",
            &["general pain reliever", "anti-inflammatory"],
            &[
                "Rest and stay hydrated",
                "Monitor your symptoms",
                "Maintain a healthy diet",
            ],
            &[
                "Severe pain",
                "Difficulty breathing",
                "High fever",
                "Persistent vomiting",
            ],
            "Since I'm not familiar with these symptoms, it's best to consult with a healthcare provider for accurate diagnosis and treatment.",
        ),
    }
}

fn template(
    causes: &str,
    medicine_categories: &[&str],
    home_remedies: &[&str],
    red_flags: &[&str],
    next_steps: &str,
) -> ResponseTemplate {
    ResponseTemplate {
        causes: causes.to_string(),
        medicine_categories: strings(medicine_categories),
        home_remedies: strings(home_remedies),
        red_flags: strings(red_flags),
        next_steps: next_steps.to_string(),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}
