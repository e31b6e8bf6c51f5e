use regex::Regex;

use crate::models::{Augmentation, CannedReply, Classification, IntentKey};

/// Lower-cases and trims, then collapses inner whitespace runs to one space.
pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_lowercase()
}

#[derive(Debug, Clone)]
enum Trigger {
    Contains(&'static [&'static str]),
    /// Phrase must open the message and end on a word boundary.
    Anchored(Regex),
}

#[derive(Debug, Clone)]
pub struct IntentRule {
    name: &'static str,
    trigger: Trigger,
    outcome: Classification,
}

impl IntentRule {
    pub fn contains(
        name: &'static str,
        needles: &'static [&'static str],
        outcome: Classification,
    ) -> Self {
        Self {
            name,
            trigger: Trigger::Contains(needles),
            outcome,
        }
    }

    pub fn anchored(name: &'static str, phrases: &[&str], outcome: Classification) -> Self {
        let alternation = phrases
            .iter()
            .map(|phrase| regex::escape(phrase))
            .collect::<Vec<_>>()
            .join("|");
        let regex = Regex::new(&format!(r"^(?:{alternation})\b")).expect("valid anchored rule regex");

        Self {
            name,
            trigger: Trigger::Anchored(regex),
            outcome,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn outcome(&self) -> Classification {
        self.outcome
    }

    pub fn is_anchored(&self) -> bool {
        matches!(self.trigger, Trigger::Anchored(_))
    }

    /// `normalized` must already be lower-cased and trimmed.
    pub fn matches(&self, normalized: &str) -> bool {
        match &self.trigger {
            Trigger::Contains(needles) => contains_any(normalized, needles),
            Trigger::Anchored(regex) => regex.is_match(normalized),
        }
    }
}

/// First-match-wins rule list. Order is the only tie breaker.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::standard()
    }
}

impl IntentClassifier {
    pub fn new(rules: Vec<IntentRule>) -> Self {
        Self { rules }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            IntentRule::contains(
                "fever",
                &["fever", "temperature", "hot", "burning up", "chills"],
                Classification::template(IntentKey::Fever),
            ),
            IntentRule::contains(
                "headache",
                &["headache", "head ache", "head hurts", "head pain", "migraine"],
                Classification::template(IntentKey::Headache),
            ),
            IntentRule::contains(
                "cold",
                &[
                    "cold",
                    "flu",
                    "cough",
                    "runny nose",
                    "sneezing",
                    "sore throat",
                    "stuffy nose",
                ],
                Classification::template(IntentKey::Cold),
            ),
            IntentRule::contains(
                "stomach",
                &["stomach", "nausea", "vomit", "diarrhea", "indigestion"],
                Classification::template(IntentKey::Stomach),
            ),
            IntentRule::contains(
                "help",
                &["help", "assist", "advice"],
                Classification::canned(CannedReply::Help),
            ),
            IntentRule::anchored(
                "capabilities",
                &["what can you do", "who are you", "what are you"],
                Classification::canned(CannedReply::Help),
            ),
            IntentRule::anchored(
                "greeting",
                &[
                    "hello",
                    "hi",
                    "hey",
                    "greetings",
                    "good morning",
                    "good afternoon",
                    "good evening",
                ],
                Classification::canned(CannedReply::Greeting),
            ),
            IntentRule::anchored(
                "wellbeing",
                &["how are you", "how's it going", "how are things"],
                Classification::canned(CannedReply::Wellbeing),
            ),
            IntentRule::contains(
                "thanks",
                &["thank", "thx", "appreciate"],
                Classification::canned(CannedReply::Thanks),
            ),
            IntentRule::anchored(
                "farewell",
                &["bye", "goodbye", "good bye", "see you", "farewell", "good night"],
                Classification::canned(CannedReply::Farewell),
            ),
            IntentRule::contains(
                "fatigue",
                &["tired", "fatigue", "exhausted", "no energy"],
                Classification::augmented(Augmentation::Fatigue),
            ),
            IntentRule::contains(
                "pain",
                &["pain", "hurt", "ache", "sore"],
                Classification::augmented(Augmentation::Pain),
            ),
            IntentRule::contains(
                "general_inquiry",
                &["tell me", "explain", "information about"],
                Classification::augmented(Augmentation::GeneralInquiry),
            ),
        ])
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    pub fn classify(&self, text: &str) -> Classification {
        self.explain(text)
            .map(IntentRule::outcome)
            .unwrap_or(Classification::template(IntentKey::Default))
    }

    /// The rule that decides `text`, or `None` when it falls through to `default`.
    pub fn explain(&self, text: &str) -> Option<&IntentRule> {
        let normalized = normalize_text(text);
        self.rules.iter().find(|rule| rule.matches(&normalized))
    }

    /// Every template key the rules can produce, plus the fallback.
    pub fn reachable_keys(&self) -> Vec<IntentKey> {
        let mut keys = self
            .rules
            .iter()
            .filter_map(|rule| rule.outcome.intent_key())
            .collect::<Vec<_>>();
        keys.push(IntentKey::Default);
        keys.sort();
        keys.dedup();
        keys
    }
}

fn contains_any(input: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| input.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Classification {
        IntentClassifier::standard().classify(text)
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_text("  I Have\ta   FEVER \n"), "i have a fever");
    }

    #[test]
    fn inner_whitespace_does_not_split_phrases() {
        assert_eq!(
            classify("I am  burning\tup"),
            Classification::template(IntentKey::Fever)
        );
    }

    #[test]
    fn fever_rule_precedes_headache_rule() {
        assert_eq!(
            classify("I have a fever and headache"),
            Classification::template(IntentKey::Fever)
        );
    }

    #[test]
    fn classifies_each_symptom_family() {
        assert_eq!(
            classify("My head hurts since this morning"),
            Classification::template(IntentKey::Headache)
        );
        assert_eq!(
            classify("runny nose and sneezing"),
            Classification::template(IntentKey::Cold)
        );
        assert_eq!(
            classify("Feeling nausea after lunch"),
            Classification::template(IntentKey::Stomach)
        );
    }

    #[test]
    fn thanks_wins_over_pain() {
        assert_eq!(
            classify("thank you, the pain is much better"),
            Classification::canned(CannedReply::Thanks)
        );
    }

    #[test]
    fn greeting_is_anchored_to_message_start() {
        assert_eq!(classify("hello"), Classification::canned(CannedReply::Greeting));
        assert_eq!(classify("Hi there"), Classification::canned(CannedReply::Greeting));
        assert_eq!(classify("oh hi"), Classification::template(IntentKey::Default));
        assert_eq!(classify("hiccups again"), Classification::template(IntentKey::Default));
    }

    #[test]
    fn farewell_is_anchored_to_message_start() {
        assert_eq!(
            classify("Goodbye for now"),
            Classification::canned(CannedReply::Farewell)
        );
        assert_eq!(classify("maybe bye"), Classification::template(IntentKey::Default));
    }

    #[test]
    fn meta_questions_get_help_reply() {
        assert_eq!(
            classify("what can you do?"),
            Classification::canned(CannedReply::Help)
        );
        assert_eq!(
            classify("can you assist me"),
            Classification::canned(CannedReply::Help)
        );
    }

    #[test]
    fn wellbeing_reply_for_how_are_you() {
        assert_eq!(
            classify("How are you today?"),
            Classification::canned(CannedReply::Wellbeing)
        );
    }

    #[test]
    fn generic_pain_augments_default() {
        assert_eq!(
            classify("my knee hurts after running"),
            Classification::augmented(Augmentation::Pain)
        );
    }

    #[test]
    fn late_rules_catch_what_categories_miss() {
        assert_eq!(
            classify("I feel so tired lately"),
            Classification::augmented(Augmentation::Fatigue)
        );
        assert_eq!(
            classify("tell me about allergies"),
            Classification::augmented(Augmentation::GeneralInquiry)
        );
    }

    #[test]
    fn unmatched_text_falls_back_to_default() {
        assert_eq!(
            classify("my skin is itchy"),
            Classification::template(IntentKey::Default)
        );
        assert!(IntentClassifier::standard().explain("my skin is itchy").is_none());
    }

    #[test]
    fn classification_is_deterministic() {
        let classifier = IntentClassifier::standard();
        let first = classifier.classify("stomach cramps and vomiting");
        for _ in 0..10 {
            assert_eq!(classifier.classify("stomach cramps and vomiting"), first);
        }
    }

    #[test]
    fn custom_rule_order_changes_precedence() {
        let classifier = IntentClassifier::new(vec![
            IntentRule::contains(
                "pain",
                &["pain"],
                Classification::augmented(Augmentation::Pain),
            ),
            IntentRule::contains(
                "thanks",
                &["thank"],
                Classification::canned(CannedReply::Thanks),
            ),
        ]);
        assert_eq!(
            classifier.classify("thanks, the pain is gone"),
            Classification::augmented(Augmentation::Pain)
        );
    }

    #[test]
    fn explain_names_the_deciding_rule() {
        let classifier = IntentClassifier::standard();
        let rule = classifier.explain("Good morning!").expect("greeting should match");
        assert_eq!(rule.name(), "greeting");
        assert!(rule.is_anchored());
    }

    #[test]
    fn reachable_keys_include_default() {
        let keys = IntentClassifier::standard().reachable_keys();
        assert_eq!(keys, IntentKey::ALL.to_vec());
    }
}
