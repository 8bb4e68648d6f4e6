//! Tone analysis record and its enumerated domains.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Summary returned when there is no text to analyze.
pub const EMPTY_SUMMARY: &str = "Cannot analyze empty content";

/// Maximum number of topics kept in an analysis.
pub const MAX_TOPICS: usize = 4;

/// Maximum summary length in characters, before the ellipsis.
pub const SUMMARY_MAX_CHARS: usize = 100;

/// Overall sentiment of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sentiment {
    VeryNegative,
    Negative,
    #[default]
    Neutral,
    Positive,
    VeryPositive,
}

impl Sentiment {
    pub fn is_negative(&self) -> bool {
        matches!(self, Self::Negative | Self::VeryNegative)
    }
}

/// Emotion tags carried in `ToneAnalysis::emotions`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Emotion {
    Anger,
    Fear,
    Happiness,
    Sadness,
    Surprise,
    Disgust,
    Neutral,
}

/// How quickly the sender expects a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Urgency {
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// Register of the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Formality {
    VeryInformal,
    Informal,
    #[default]
    Neutral,
    Formal,
    VeryFormal,
}

macro_rules! display_as_serde_name {
    ($ty:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let s = match self {
                    $(Self::$variant => $name,)+
                };
                write!(f, "{s}")
            }
        }
    };
}

display_as_serde_name!(Sentiment {
    VeryNegative => "VERY_NEGATIVE",
    Negative => "NEGATIVE",
    Neutral => "NEUTRAL",
    Positive => "POSITIVE",
    VeryPositive => "VERY_POSITIVE",
});

display_as_serde_name!(Urgency {
    Low => "LOW",
    Normal => "NORMAL",
    High => "HIGH",
    Critical => "CRITICAL",
});

display_as_serde_name!(Formality {
    VeryInformal => "VERY_INFORMAL",
    Informal => "INFORMAL",
    Neutral => "NEUTRAL",
    Formal => "FORMAL",
    VeryFormal => "VERY_FORMAL",
});

/// Structured tone assessment of one message.
///
/// Immutable once built: fields are only readable through accessors.
/// Emotion weights are confidence-like scores in `[0, 1]` and are not
/// normalized, so they need not sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ToneAnalysisRecord")]
pub struct ToneAnalysis {
    sentiment: Sentiment,
    emotions: BTreeMap<Emotion, f32>,
    urgency: Urgency,
    formality: Formality,
    top_topics: Vec<String>,
    summary_text: String,
}

/// Stored form of `ToneAnalysis`; loaded records go back through `new`.
#[derive(Deserialize)]
struct ToneAnalysisRecord {
    sentiment: Sentiment,
    #[serde(default)]
    emotions: BTreeMap<Emotion, f32>,
    urgency: Urgency,
    formality: Formality,
    #[serde(default)]
    top_topics: Vec<String>,
    #[serde(default)]
    summary_text: String,
}

impl From<ToneAnalysisRecord> for ToneAnalysis {
    fn from(record: ToneAnalysisRecord) -> Self {
        Self::new(
            record.sentiment,
            record.emotions,
            record.urgency,
            record.formality,
            record.top_topics,
            record.summary_text,
        )
    }
}

impl ToneAnalysis {
    /// Build an analysis. Weights are clamped to `[0, 1]` and topics are
    /// capped at `MAX_TOPICS`. An empty emotion map gets `{Neutral: 1.0}`.
    pub fn new(
        sentiment: Sentiment,
        emotions: impl IntoIterator<Item = (Emotion, f32)>,
        urgency: Urgency,
        formality: Formality,
        mut top_topics: Vec<String>,
        summary_text: impl Into<String>,
    ) -> Self {
        let mut emotions: BTreeMap<Emotion, f32> = emotions
            .into_iter()
            .map(|(emotion, weight)| (emotion, weight.clamp(0.0, 1.0)))
            .collect();
        if emotions.is_empty() {
            emotions.insert(Emotion::Neutral, 1.0);
        }
        top_topics.truncate(MAX_TOPICS);

        Self {
            sentiment,
            emotions,
            urgency,
            formality,
            top_topics,
            summary_text: summary_text.into(),
        }
    }

    /// The fixed analysis returned for empty or unanalyzable text.
    pub fn neutral_default() -> Self {
        Self::new(
            Sentiment::Neutral,
            [(Emotion::Neutral, 1.0)],
            Urgency::Normal,
            Formality::Neutral,
            Vec::new(),
            EMPTY_SUMMARY,
        )
    }

    pub fn sentiment(&self) -> Sentiment {
        self.sentiment
    }

    pub fn emotions(&self) -> &BTreeMap<Emotion, f32> {
        &self.emotions
    }

    /// Weight for one emotion, 0.0 when absent.
    pub fn emotion(&self, emotion: Emotion) -> f32 {
        self.emotions.get(&emotion).copied().unwrap_or(0.0)
    }

    pub fn urgency(&self) -> Urgency {
        self.urgency
    }

    pub fn formality(&self) -> Formality {
        self.formality
    }

    pub fn top_topics(&self) -> &[String] {
        &self.top_topics
    }

    pub fn summary_text(&self) -> &str {
        &self.summary_text
    }
}

impl Default for ToneAnalysis {
    fn default() -> Self {
        Self::neutral_default()
    }
}
