//! Deterministic keyword classifier.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::ToneAnalyzer;
use super::rules::ClassifierRules;
use crate::error::ClassificationError;
use crate::model::tone::{
    Emotion, MAX_TOPICS, SUMMARY_MAX_CHARS, Sentiment, ToneAnalysis,
};

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W+").expect("static regex is valid"));

/// Tokens this short never count as topics.
const MIN_TOPIC_LEN: usize = 4;

/// Maps message text to a `ToneAnalysis` with ordered keyword tables.
///
/// Total: never fails, and returns `ToneAnalysis::neutral_default()` for
/// empty or whitespace-only text.
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier {
    rules: ClassifierRules,
}

impl KeywordClassifier {
    pub fn new(rules: ClassifierRules) -> Self {
        Self { rules }
    }

    pub fn classify(&self, text: &str) -> ToneAnalysis {
        if text.trim().is_empty() {
            return ToneAnalysis::neutral_default();
        }

        let lowered = text.to_lowercase();
        let sentiment = self.rules.sentiment.evaluate(&lowered).unwrap_or_default();
        let urgency = self.rules.urgency.evaluate(&lowered).unwrap_or_default();
        let formality = self.rules.formality.evaluate(&lowered).unwrap_or_default();

        ToneAnalysis::new(
            sentiment,
            emotions_for(sentiment),
            urgency,
            formality,
            self.extract_topics(&lowered),
            summarize(text),
        )
    }

    /// Most frequent tokens, ties broken by first occurrence.
    fn extract_topics(&self, lowered: &str) -> Vec<String> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for token in NON_WORD.split(lowered) {
            if token.chars().count() < MIN_TOPIC_LEN
                || self.rules.stop_words.iter().any(|s| s == token)
            {
                continue;
            }
            match index.get(token) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    index.insert(token, counts.len());
                    counts.push((token, 1));
                }
            }
        }

        // Stable sort keeps first-occurrence order among equal counts.
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
            .into_iter()
            .take(MAX_TOPICS)
            .map(|(token, _)| token.to_string())
            .collect()
    }
}

#[async_trait]
impl ToneAnalyzer for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn analyze(&self, text: &str) -> Result<ToneAnalysis, ClassificationError> {
        Ok(self.classify(text))
    }
}

/// Heuristic emotion weights for a sentiment. Not calibrated probabilities.
pub fn emotions_for(sentiment: Sentiment) -> Vec<(Emotion, f32)> {
    match sentiment {
        Sentiment::VeryNegative => vec![(Emotion::Anger, 0.7), (Emotion::Sadness, 0.3)],
        Sentiment::Negative => vec![(Emotion::Sadness, 0.5), (Emotion::Neutral, 0.3)],
        Sentiment::Neutral => vec![(Emotion::Neutral, 1.0)],
        Sentiment::Positive => vec![(Emotion::Happiness, 0.7), (Emotion::Neutral, 0.3)],
        Sentiment::VeryPositive => vec![(Emotion::Happiness, 0.9), (Emotion::Surprise, 0.3)],
    }
}

/// First `SUMMARY_MAX_CHARS` characters of the raw text, with "..." when cut.
pub fn summarize(text: &str) -> String {
    match text.char_indices().nth(SUMMARY_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tone::{EMPTY_SUMMARY, Formality, Urgency};

    fn classify(text: &str) -> ToneAnalysis {
        KeywordClassifier::default().classify(text)
    }

    #[test]
    fn empty_and_whitespace_give_default() {
        assert_eq!(classify(""), ToneAnalysis::neutral_default());
        assert_eq!(classify("  \n\t "), ToneAnalysis::neutral_default());
        assert_eq!(classify("").summary_text(), EMPTY_SUMMARY);
    }

    #[test]
    fn urgent_request_is_high() {
        let analysis = classify("This is urgent, please help ASAP");
        assert_eq!(analysis.urgency(), Urgency::High);
        assert_eq!(analysis.sentiment(), Sentiment::Neutral);
    }

    #[test]
    fn thanks_is_positive() {
        let analysis = classify("Thanks, great service!");
        assert_eq!(analysis.sentiment(), Sentiment::Positive);
        assert_eq!(analysis.urgency(), Urgency::Normal);
        assert_eq!(analysis.formality(), Formality::Informal);
        assert_eq!(analysis.emotion(Emotion::Happiness), 0.7);
    }

    #[test]
    fn negative_checked_before_very_negative() {
        let analysis = classify("I'm frustrated, this error keeps happening");
        assert_eq!(analysis.sentiment(), Sentiment::Negative);

        let analysis = classify("I'm frustrated and angry");
        assert_eq!(analysis.sentiment(), Sentiment::VeryNegative);
        assert_eq!(analysis.emotion(Emotion::Anger), 0.7);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let analysis = classify("CRITICAL: EMERGENCY in production");
        assert_eq!(analysis.urgency(), Urgency::Critical);
    }

    #[test]
    fn neutral_text_has_neutral_emotion() {
        let analysis = classify("The quarterly report is attached.");
        assert_eq!(analysis.sentiment(), Sentiment::Neutral);
        assert_eq!(analysis.emotion(Emotion::Neutral), 1.0);
    }

    #[test]
    fn topics_by_frequency_then_first_occurrence() {
        let analysis = classify(
            "invoice payment invoice refund payment invoice account balance",
        );
        assert_eq!(
            analysis.top_topics(),
            &["invoice", "payment", "refund", "account"]
        );
    }

    #[test]
    fn topics_skip_short_and_stop_words() {
        let analysis = classify("This is your order from that shop with love, have fun");
        let topics = analysis.top_topics();
        for dropped in ["this", "your", "from", "that", "with", "have", "is", "fun"] {
            assert!(!topics.iter().any(|t| t == dropped), "{dropped} kept");
        }
        assert_eq!(topics, &["order", "shop", "love"]);
    }

    #[test]
    fn topics_capped_at_four() {
        let analysis = classify("alpha bravo charlie delta echo foxtrot golf");
        assert_eq!(analysis.top_topics().len(), 4);
    }

    #[test]
    fn summary_truncates_at_100_chars() {
        let long = "a".repeat(150);
        let analysis = classify(&long);
        assert_eq!(analysis.summary_text().len(), 103);
        assert!(analysis.summary_text().ends_with("..."));

        let exact = "b".repeat(100);
        assert_eq!(classify(&exact).summary_text(), exact);
    }

    #[test]
    fn summary_keeps_original_case_and_multibyte() {
        assert_eq!(summarize("Hello World"), "Hello World");
        let text = "é".repeat(120);
        let summary = summarize(&text);
        assert_eq!(summary.chars().count(), 103);
    }

    #[test]
    fn output_domain_is_always_enumerated() {
        let samples = [
            "x",
            "Dear Sir, respectfully I report a terrible issue",
            "hey lol gonna be late, no rush",
            "EMERGENCY!!! fantastic amazing love",
            "12345 67890 !!!",
        ];
        for text in samples {
            let analysis = classify(text);
            assert!(analysis.top_topics().len() <= 4);
            assert!(!analysis.emotions().is_empty());
            for weight in analysis.emotions().values() {
                assert!((0.0..=1.0).contains(weight));
            }
        }
    }

    #[test]
    fn custom_rules_are_used() {
        use crate::classifier::rules::{KeywordRule, RuleTable};

        let mut rules = ClassifierRules::default();
        rules.urgency = RuleTable::new(
            "urgency",
            vec![KeywordRule::new(&["pronto"], Urgency::Critical)],
        );
        let classifier = KeywordClassifier::new(rules);
        assert_eq!(classifier.classify("pronto please").urgency(), Urgency::Critical);
        assert_eq!(classifier.classify("urgent please").urgency(), Urgency::Normal);
    }

    #[tokio::test]
    async fn analyzer_impl_never_fails() {
        let classifier = KeywordClassifier::default();
        let analysis = classifier.analyze("").await.unwrap();
        assert_eq!(analysis, ToneAnalysis::neutral_default());
    }
}
