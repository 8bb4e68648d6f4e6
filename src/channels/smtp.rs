//! SMTP reply transport via lettre.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use tracing::info;

use crate::channels::{OutboundReply, ReplyTransport};
use crate::config::SmtpConfig;
use crate::error::TransportError;

const TRANSPORT_NAME: &str = "smtp";

/// Sends replies through an authenticated SMTP relay.
///
/// lettre's `SmtpTransport` is blocking, so each send runs on the
/// blocking pool.
#[derive(Clone)]
pub struct SmtpReplyTransport {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpReplyTransport {
    pub fn new(config: &SmtpConfig) -> Result<Self, TransportError> {
        let from = parse_mailbox(&config.from_address)?;

        let creds = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let transport = SmtpTransport::relay(&config.host)
            .map_err(|e| send_failed(format!("SMTP relay error: {e}")))?
            .port(config.port)
            .credentials(creds)
            .build();

        info!(host = %config.host, port = config.port, "SMTP transport configured");
        Ok(Self { transport, from })
    }

    fn build_message(&self, reply: &OutboundReply) -> Result<Message, TransportError> {
        Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&reply.to)?)
            .subject(reply.subject.as_str())
            .body(reply.body.clone())
            .map_err(|e| send_failed(format!("Failed to build email: {e}")))
    }
}

#[async_trait]
impl ReplyTransport for SmtpReplyTransport {
    fn name(&self) -> &str {
        TRANSPORT_NAME
    }

    async fn send_reply(&self, reply: &OutboundReply) -> Result<(), TransportError> {
        let email = self.build_message(reply)?;
        let transport = self.transport.clone();

        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| send_failed(format!("SMTP task failed: {e}")))?
            .map_err(|e| send_failed(format!("SMTP send failed: {e}")))?;

        info!(to = %reply.to, "Reply sent");
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address
        .trim()
        .parse()
        .map_err(|e| TransportError::InvalidAddress {
            address: address.to_string(),
            reason: format!("{e}"),
        })
}

fn send_failed(reason: String) -> TransportError {
    TransportError::SendFailed {
        transport: TRANSPORT_NAME.into(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config(from: &str) -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: "bot@example.com".into(),
            password: SecretString::from("hunter2".to_string()),
            from_address: from.into(),
        }
    }

    #[test]
    fn mailbox_accepts_display_name() {
        let mailbox = parse_mailbox("Alice Smith <alice@example.com>").unwrap();
        assert_eq!(mailbox.email.to_string(), "alice@example.com");
    }

    #[test]
    fn mailbox_rejects_garbage() {
        let err = parse_mailbox("not an address").unwrap_err();
        assert!(matches!(err, TransportError::InvalidAddress { .. }));
    }

    #[test]
    fn invalid_from_address_rejected() {
        let err = SmtpReplyTransport::new(&config("nope")).err().unwrap();
        assert!(matches!(err, TransportError::InvalidAddress { .. }));
    }

    #[test]
    fn builds_reply_message() {
        let transport = SmtpReplyTransport::new(&config("Support <support@example.com>")).unwrap();
        let reply = OutboundReply {
            to: "alice@example.com".into(),
            subject: "Re: Order".into(),
            body: "Thanks".into(),
        };
        let formatted = String::from_utf8(transport.build_message(&reply).unwrap().formatted()).unwrap();
        assert!(formatted.contains("Subject: Re: Order"));
        assert!(formatted.contains("To: alice@example.com"));
    }

    #[test]
    fn bad_recipient_is_invalid_address() {
        let transport = SmtpReplyTransport::new(&config("support@example.com")).unwrap();
        let reply = OutboundReply {
            to: "???".into(),
            subject: "Re".into(),
            body: String::new(),
        };
        assert!(matches!(
            transport.build_message(&reply),
            Err(TransportError::InvalidAddress { .. })
        ));
    }
}
