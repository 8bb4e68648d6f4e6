//! Raw RFC 5322 ingestion via mail-parser.

use mail_parser::{Address, MessageParser, MimeHeaders};

use crate::error::ValidationError;
use crate::model::email::NewEmail;

/// Parse a raw message (e.g. an `.eml` file) into a validated `NewEmail`.
///
/// The sender keeps its display name (`Name <addr>`) so replies can greet
/// it. Plain-text bodies win over HTML; HTML is reduced to text.
pub fn parse_raw_email(raw: &[u8]) -> Result<NewEmail, ValidationError> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| ValidationError::Unparseable("not an RFC 5322 message".into()))?;

    let from = first_mailbox(parsed.from()).ok_or(ValidationError::MissingField("from"))?;
    let to = first_mailbox(parsed.to()).ok_or(ValidationError::MissingField("to"))?;

    let mut email = NewEmail::new(from, to).with_content(extract_text(&parsed));
    if let Some(subject) = parsed.subject().map(str::trim).filter(|s| !s.is_empty()) {
        email = email.with_subject(subject);
    }
    email.validate()?;
    Ok(email)
}

/// First address of a header, as `Name <addr>` when a name is present.
fn first_mailbox(address: Option<&Address>) -> Option<String> {
    let addr = address?.first()?;
    let email = addr.address()?.trim();
    if email.is_empty() {
        return None;
    }
    Some(match addr.name().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("{name} <{email}>"),
        None => email.to_string(),
    })
}

/// Extract readable text from a parsed email. Empty when there is none.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.trim().to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    for part in parsed.attachments() {
        let part: &mail_parser::MessagePart = part;
        if let Some(ct) = MimeHeaders::content_type(part)
            && ct.ctype() == "text"
            && let Ok(text) = std::str::from_utf8(part.contents())
        {
            return text.trim().to_string();
        }
    }
    String::new()
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}
