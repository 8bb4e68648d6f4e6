//! Message I/O: raw inbound parsing and outbound reply transports.

pub mod ingest;
pub mod smtp;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::error::TransportError;
use crate::model::email::EmailMessage;
use crate::templates::render::NO_SUBJECT;

pub use ingest::parse_raw_email;
pub use smtp::SmtpReplyTransport;

/// A rendered reply ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundReply {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutboundReply {
    /// Reply to `message`'s sender with subject `Re: <subject>`.
    pub fn to_message(message: &EmailMessage, body: impl Into<String>) -> Self {
        let subject = message.subject.as_deref().unwrap_or(NO_SUBJECT);
        let subject = if subject.to_ascii_lowercase().starts_with("re:") {
            subject.to_string()
        } else {
            format!("Re: {subject}")
        };
        Self {
            to: message.from.clone(),
            subject,
            body: body.into(),
        }
    }
}

/// Delivers replies. Implementations must be safe to share across tasks.
#[async_trait]
pub trait ReplyTransport: Send + Sync {
    /// Transport name (e.g. "smtp", "log").
    fn name(&self) -> &str;

    /// Deliver a single reply.
    async fn send_reply(&self, reply: &OutboundReply) -> Result<(), TransportError>;
}

/// Dry-run transport: logs the reply instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReplyTransport;

#[async_trait]
impl ReplyTransport for LogReplyTransport {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_reply(&self, reply: &OutboundReply) -> Result<(), TransportError> {
        info!(
            to = %reply.to,
            subject = %reply.subject,
            body_len = reply.body.len(),
            "Reply not sent (no SMTP configured)"
        );
        Ok(())
    }
}
