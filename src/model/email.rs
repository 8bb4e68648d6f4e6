//! Inbound email records.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::tone::ToneAnalysis;
use crate::pipeline::lifecycle::MessageStatus;

/// Inbound message as supplied by a transport or the manual trigger,
/// before it has entered the lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmail {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub content: String,
}

impl NewEmail {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: None,
            content: String::new(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Reject input missing a sender or recipient.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.from.trim().is_empty() {
            return Err(ValidationError::MissingField("from"));
        }
        if self.to.trim().is_empty() {
            return Err(ValidationError::MissingField("to"));
        }
        Ok(())
    }
}

/// A message tracked through the processing lifecycle.
///
/// Held by exactly one pipeline stage at a time; stages pass it by value
/// or `&mut`, never share it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Assigned on first persistence.
    pub id: Option<String>,
    pub from: String,
    pub to: String,
    pub subject: Option<String>,
    /// Raw body text. Empty string when there is no body.
    pub content: String,
    pub received_date: DateTime<Utc>,
    pub processed_date: Option<DateTime<Utc>>,
    pub tone_analysis: Option<ToneAnalysis>,
    pub status: MessageStatus,
}

impl EmailMessage {
    /// Build a fresh, unpersisted record in `Received`.
    pub fn received(new: NewEmail) -> Self {
        Self {
            id: None,
            from: new.from,
            to: new.to,
            subject: new.subject,
            content: new.content,
            // Stored timestamps carry microseconds.
            received_date: Utc::now().trunc_subsecs(6),
            processed_date: None,
            tone_analysis: None,
            status: MessageStatus::Received,
        }
    }

    /// Id for logging; `"-"` before persistence.
    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or("-")
    }
}

/// Normalize an address for history lookups: the bare address inside
/// `Name <addr>`, trimmed and lower-cased.
pub fn normalize_address(raw: &str) -> String {
    let trimmed = raw.trim();
    let bare = match (trimmed.rfind('<'), trimmed.rfind('>')) {
        (Some(start), Some(end)) if start < end => &trimmed[start + 1..end],
        _ => trimmed,
    };
    bare.trim().to_lowercase()
}

/// Human-facing name for a sender: the display name of `Name <addr>`,
/// otherwise the local part of the address.
pub fn sender_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(start) = trimmed.find('<') {
        let name = trimmed[..start].trim().trim_matches('"').trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }
    let address = normalize_address(trimmed);
    match address.split_once('@') {
        Some((local, _)) if !local.is_empty() => local.to_string(),
        _ => address,
    }
}
