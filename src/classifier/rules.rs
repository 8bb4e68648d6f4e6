//! Ordered keyword rule tables for the tone classifier.
//!
//! Each table is evaluated top to bottom against lower-cased text and the
//! first rule with a matching keyword decides the category. Precedence is
//! therefore the order of the rules in the table:
//!
//! - sentiment: negative ("problem", "error", "issue") is checked *before*
//!   very-negative ("angry", "frustrated", "terrible"), so a message
//!   containing both is `Negative`.
//! - urgency: critical before high before low.
//! - formality: very formal before formal before very informal before informal.

use tracing::debug;

use crate::model::tone::{Formality, Sentiment, Urgency};

/// A single keyword rule: any keyword present selects `category`.
#[derive(Debug, Clone)]
pub struct KeywordRule<T> {
    /// Lower-cased keywords, matched at the start of a word.
    pub keywords: Vec<String>,
    pub category: T,
}

impl<T> KeywordRule<T> {
    pub fn new(keywords: &[&str], category: T) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            category,
        }
    }

    fn matching_keyword(&self, lowered: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|k| !k.is_empty() && starts_word(lowered, k))
            .map(String::as_str)
    }
}

/// True if `keyword` occurs in `text` beginning at a word boundary, so
/// "thank" matches "thanks" but "hey" does not match "they".
fn starts_word(text: &str, keyword: &str) -> bool {
    text.match_indices(keyword).any(|(idx, _)| {
        text[..idx]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric())
    })
}

/// An ordered rule table; the first matching rule wins.
#[derive(Debug, Clone)]
pub struct RuleTable<T> {
    name: &'static str,
    rules: Vec<KeywordRule<T>>,
}

impl<T: Copy + std::fmt::Debug> RuleTable<T> {
    pub fn new(name: &'static str, rules: Vec<KeywordRule<T>>) -> Self {
        Self { name, rules }
    }

    /// Category of the first matching rule. `lowered` must already be
    /// lower-cased.
    pub fn evaluate(&self, lowered: &str) -> Option<T> {
        self.rules.iter().find_map(|rule| {
            rule.matching_keyword(lowered).map(|keyword| {
                debug!(
                    table = self.name,
                    keyword,
                    category = ?rule.category,
                    "Keyword rule matched"
                );
                rule.category
            })
        })
    }
}

/// Tokens ignored by topic extraction (in addition to short tokens).
pub const DEFAULT_STOP_WORDS: &[&str] = &["from", "this", "that", "with", "have", "your"];

/// Immutable classifier configuration.
#[derive(Debug, Clone)]
pub struct ClassifierRules {
    pub sentiment: RuleTable<Sentiment>,
    pub urgency: RuleTable<Urgency>,
    pub formality: RuleTable<Formality>,
    pub stop_words: Vec<String>,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        let sentiment = RuleTable::new(
            "sentiment",
            vec![
                KeywordRule::new(&["problem", "error", "issue"], Sentiment::Negative),
                KeywordRule::new(&["angry", "frustrated", "terrible"], Sentiment::VeryNegative),
                KeywordRule::new(&["thank", "great", "excellent"], Sentiment::Positive),
                KeywordRule::new(&["amazing", "love", "fantastic"], Sentiment::VeryPositive),
            ],
        );

        let urgency = RuleTable::new(
            "urgency",
            vec![
                KeywordRule::new(&["critical", "emergency", "immediately"], Urgency::Critical),
                KeywordRule::new(&["urgent", "asap", "important"], Urgency::High),
                KeywordRule::new(&["when you can", "no rush", "whenever"], Urgency::Low),
            ],
        );

        let formality = RuleTable::new(
            "formality",
            vec![
                KeywordRule::new(&["dear sir", "dear madam", "respectfully"], Formality::VeryFormal),
                KeywordRule::new(&["dear", "sincerely", "regards"], Formality::Formal),
                KeywordRule::new(&["hey", "lol", "gonna"], Formality::VeryInformal),
                KeywordRule::new(&["thanks", "cheers", "btw"], Formality::Informal),
            ],
        );

        Self {
            sentiment,
            urgency,
            formality,
            stop_words: DEFAULT_STOP_WORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
