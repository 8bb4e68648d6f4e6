//! Auto-reply decision policy.

use crate::model::tone::ToneAnalysis;

/// Whether a message warrants an automated reply.
///
/// True iff urgency is High/Critical or sentiment is Negative/VeryNegative.
/// Depends only on `(sentiment, urgency)`; a missing analysis means no
/// decision is possible and yields `false`.
pub fn should_auto_reply(analysis: Option<&ToneAnalysis>) -> bool {
    match analysis {
        Some(analysis) => analysis.urgency().is_elevated() || analysis.sentiment().is_negative(),
        None => false,
    }
}
