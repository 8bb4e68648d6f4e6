//! Placeholder substitution for reply templates.
//!
//! Substitution is literal and happens in a single left-to-right pass:
//! inserted values are never re-scanned, so a value containing another
//! token (e.g. a subject of `"{{SENDER_NAME}}"`) is emitted as-is. Tokens
//! without a value are left verbatim.

use crate::model::email::{EmailMessage, sender_name};
use crate::model::history::SenderHistory;

pub const SENDER_NAME: &str = "{{SENDER_NAME}}";
pub const SUBJECT: &str = "{{SUBJECT}}";
pub const EMAIL_COUNT: &str = "{{EMAIL_COUNT}}";
pub const LAST_EMAIL_DATE: &str = "{{LAST_EMAIL_DATE}}";
pub const SIMPLE_SUBJECT: &str = "{subject}";
pub const SIMPLE_FROM: &str = "{from}";
pub const SIMPLE_SUMMARY: &str = "{summary}";

/// Subject value used when the message has none.
pub const NO_SUBJECT: &str = "(no subject)";

/// Token → value mapping applied by `render`.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    entries: Vec<(String, String)>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a token's value, replacing any previous one.
    pub fn set(&mut self, token: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let token = token.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(t, _)| *t == token) {
            Some(entry) => entry.1 = value,
            None => {
                self.entries.push((token, value));
                // Longest first, so a token that prefixes another never shadows it.
                self.entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
            }
        }
        self
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, v)| v.as_str())
    }

    /// Values for a reply to `message`.
    ///
    /// `{{EMAIL_COUNT}}` counts this message too. `{{LAST_EMAIL_DATE}}` is
    /// only set when the sender has written before.
    pub fn for_reply(message: &EmailMessage, history: &SenderHistory) -> Self {
        let subject = message.subject.as_deref().unwrap_or(NO_SUBJECT);
        let summary = message
            .tone_analysis
            .as_ref()
            .map(|a| a.summary_text().to_string())
            .unwrap_or_default();

        let mut placeholders = Self::new();
        placeholders
            .set(SENDER_NAME, sender_name(&message.from))
            .set(SUBJECT, subject)
            .set(EMAIL_COUNT, history.prior_count.saturating_add(1).to_string())
            .set(SIMPLE_SUBJECT, subject)
            .set(SIMPLE_FROM, message.from.as_str())
            .set(SIMPLE_SUMMARY, summary);
        if let Some(last) = history.last_contact {
            placeholders.set(LAST_EMAIL_DATE, last.format("%Y-%m-%d").to_string());
        }
        placeholders
    }

    fn match_at(&self, rest: &str) -> Option<(&str, &str)> {
        self.entries
            .iter()
            .find(|(token, _)| rest.starts_with(token.as_str()))
            .map(|(t, v)| (t.as_str(), v.as_str()))
    }
}

/// Substitute every known token in `template`.
pub fn render(template: &str, placeholders: &Placeholders) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match placeholders.match_at(rest) {
            Some((token, value)) => {
                out.push_str(value);
                rest = &rest[token.len()..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
