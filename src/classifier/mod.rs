//! Tone classification.
//!
//! `KeywordClassifier` is the built-in, infallible analyzer. The
//! `ToneAnalyzer` trait is the seam for a model-backed replacement, which
//! may fail; wrap such an analyzer in `FallbackAnalyzer` to degrade to the
//! neutral default analysis instead of failing the message.

pub mod keyword;
pub mod rules;

use async_trait::async_trait;
use tracing::warn;

pub use keyword::KeywordClassifier;
pub use rules::{ClassifierRules, KeywordRule, RuleTable};

use crate::error::ClassificationError;
use crate::model::tone::ToneAnalysis;

/// Produces a tone analysis for message text.
#[async_trait]
pub trait ToneAnalyzer: Send + Sync {
    /// Analyzer name for logging.
    fn name(&self) -> &str;

    async fn analyze(&self, text: &str) -> Result<ToneAnalysis, ClassificationError>;
}

/// Replaces any analyzer failure with `ToneAnalysis::neutral_default()`.
pub struct FallbackAnalyzer<A> {
    inner: A,
}

impl<A: ToneAnalyzer> FallbackAnalyzer<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<A: ToneAnalyzer> ToneAnalyzer for FallbackAnalyzer<A> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn analyze(&self, text: &str) -> Result<ToneAnalysis, ClassificationError> {
        match self.inner.analyze(text).await {
            Ok(analysis) => Ok(analysis),
            Err(e) => {
                warn!(
                    analyzer = self.inner.name(),
                    error = %e,
                    "Analyzer failed, using neutral default analysis"
                );
                Ok(ToneAnalysis::neutral_default())
            }
        }
    }
}
