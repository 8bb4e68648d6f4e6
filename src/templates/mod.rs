//! Reply templates: keys, selection, catalog and placeholder rendering.

pub mod catalog;
pub mod render;
pub mod selector;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use catalog::TemplateCatalog;
pub use render::{Placeholders, render};
pub use selector::{SelectorConfig, TemplateSelector};

/// Identifier of a canned reply body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKey {
    UrgentCritical,
    NegativeRepeated,
    FrequentSender,
    Default,
}

impl TemplateKey {
    pub const ALL: [TemplateKey; 4] = [
        Self::UrgentCritical,
        Self::NegativeRepeated,
        Self::FrequentSender,
        Self::Default,
    ];

    /// Key under which the template is stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UrgentCritical => "urgent_critical",
            Self::NegativeRepeated => "negative_repeated",
            Self::FrequentSender => "frequent_sender",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
