//! Message lifecycle state machine.
//!
//! ```text
//! Received ──▶ Processing ──▶ Processed ──▶ Replied
//!     │             │              │
//!     └─────────────┴──────────────┴──────▶ Error
//! ```
//!
//! Every transition is persisted before the in-memory status changes, so a
//! failed write leaves the message in its previous state.

use std::fmt;
use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DatabaseError, LifecycleError, PipelineError};
use crate::model::email::{EmailMessage, NewEmail};
use crate::model::tone::ToneAnalysis;
use crate::store::traits::MessageStore;

/// Processing stage a message currently occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    #[default]
    Received,
    Processing,
    Processed,
    Replied,
    Error,
}

impl MessageStatus {
    /// Check if this status allows moving to `target`.
    pub fn can_transition_to(&self, target: MessageStatus) -> bool {
        use MessageStatus::*;

        matches!(
            (self, target),
            (Received, Processing)
                | (Processing, Processed)
                | (Processed, Replied)
                | (Received, Error)
                | (Processing, Error)
                | (Processed, Error)
        )
    }

    /// Replied and Error end the core's involvement with a message.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Replied | Self::Error)
    }

    /// Position along the forward path; Error ranks last.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Received => 0,
            Self::Processing => 1,
            Self::Processed => 2,
            Self::Replied => 3,
            Self::Error => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Processing => "PROCESSING",
            Self::Processed => "PROCESSED",
            Self::Replied => "REPLIED",
            Self::Error => "ERROR",
        }
    }

    /// Parse a stored status string. Unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RECEIVED" => Some(Self::Received),
            "PROCESSING" => Some(Self::Processing),
            "PROCESSED" => Some(Self::Processed),
            "REPLIED" => Some(Self::Replied),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Drives status transitions and their persistence side effects.
#[derive(Clone)]
pub struct MessageLifecycle {
    store: Arc<dyn MessageStore>,
}

impl MessageLifecycle {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Persist a new message in `Received` and assign its id.
    pub async fn receive(&self, new: NewEmail) -> Result<EmailMessage, PipelineError> {
        let mut message = EmailMessage::received(new);
        let id = self.store.create_message(&message).await?;
        info!(id = %id, from = %message.from, "Message received");
        message.id = Some(id);
        Ok(message)
    }

    /// Current stored state of a message.
    pub async fn reload(&self, id: &str) -> Result<EmailMessage, PipelineError> {
        self.store
            .get_message(id)
            .await?
            .ok_or_else(|| {
                DatabaseError::NotFound {
                    entity: "message".into(),
                    id: id.to_string(),
                }
                .into()
            })
    }

    /// `Received` → `Processing`.
    pub async fn begin_processing(&self, message: &mut EmailMessage) -> Result<(), PipelineError> {
        let id = check_transition(message, MessageStatus::Processing)?;
        self.store
            .update_status(&id, MessageStatus::Processing)
            .await?;
        self.apply(message, MessageStatus::Processing);
        Ok(())
    }

    /// `Processing` → `Processed`, storing the analysis and processed date.
    pub async fn complete_processing(
        &self,
        message: &mut EmailMessage,
        analysis: ToneAnalysis,
    ) -> Result<(), PipelineError> {
        let id = check_transition(message, MessageStatus::Processed)?;
        let processed_date = Utc::now().trunc_subsecs(6);
        self.store
            .save_analysis(&id, &analysis, processed_date, MessageStatus::Processed)
            .await?;
        message.tone_analysis = Some(analysis);
        message.processed_date = Some(processed_date);
        self.apply(message, MessageStatus::Processed);
        Ok(())
    }

    /// `Processed` → `Replied`. Requires a stored tone analysis.
    pub async fn mark_replied(&self, message: &mut EmailMessage) -> Result<(), PipelineError> {
        let id = check_transition(message, MessageStatus::Replied)?;
        if message.tone_analysis.is_none() {
            return Err(LifecycleError::MissingAnalysis { id }.into());
        }
        self.store.update_status(&id, MessageStatus::Replied).await?;
        self.apply(message, MessageStatus::Replied);
        Ok(())
    }

    /// Any non-terminal status → `Error`.
    pub async fn fail(&self, message: &mut EmailMessage, reason: &str) -> Result<(), PipelineError> {
        let id = check_transition(message, MessageStatus::Error)?;
        self.store.update_status(&id, MessageStatus::Error).await?;
        info!(id = %id, reason, "Message moved to error");
        self.apply(message, MessageStatus::Error);
        Ok(())
    }

    fn apply(&self, message: &mut EmailMessage, to: MessageStatus) {
        info!(
            id = %message.id_str(),
            from = %message.status,
            to = %to,
            "Message status transition"
        );
        message.status = to;
    }
}

fn check_transition(message: &EmailMessage, to: MessageStatus) -> Result<String, LifecycleError> {
    let id = message.id.clone().ok_or(LifecycleError::NotPersisted)?;
    if !message.status.can_transition_to(to) {
        return Err(LifecycleError::InvalidTransition {
            id,
            from: message.status,
            to,
        });
    }
    Ok(id)
}
