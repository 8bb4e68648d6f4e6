//! Template selection by tone and sender history.

use tracing::debug;

use super::TemplateKey;
use crate::config::DEFAULT_FREQUENT_THRESHOLD;
use crate::model::history::SenderHistory;
use crate::model::tone::{ToneAnalysis, Urgency};

/// Selector configuration.
#[derive(Debug, Clone, Copy)]
pub struct SelectorConfig {
    /// Prior-message count at which a sender is considered frequent.
    pub frequent_threshold: u32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            frequent_threshold: DEFAULT_FREQUENT_THRESHOLD,
        }
    }
}

/// Picks the reply template for an analyzed message.
///
/// Rules, first match wins:
/// 1. Critical urgency → `UrgentCritical`
/// 2. Negative sentiment from a repeat sender → `NegativeRepeated`
/// 3. `prior_count >= frequent_threshold` → `FrequentSender`
/// 4. `Default`
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSelector {
    config: SelectorConfig,
}

impl TemplateSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn with_frequent_threshold(frequent_threshold: u32) -> Self {
        Self::new(SelectorConfig { frequent_threshold })
    }

    pub fn frequent_threshold(&self) -> u32 {
        self.config.frequent_threshold
    }

    pub fn select(&self, analysis: &ToneAnalysis, history: &SenderHistory) -> TemplateKey {
        let key = if analysis.urgency() == Urgency::Critical {
            TemplateKey::UrgentCritical
        } else if analysis.sentiment().is_negative() && history.is_repeat() {
            TemplateKey::NegativeRepeated
        } else if history.prior_count >= self.config.frequent_threshold {
            TemplateKey::FrequentSender
        } else {
            TemplateKey::Default
        };

        debug!(
            sentiment = %analysis.sentiment(),
            urgency = %analysis.urgency(),
            prior_count = history.prior_count,
            template = %key,
            "Template selected"
        );
        key
    }
}
