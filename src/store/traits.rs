//! Storage collaborator traits.
//!
//! The pipeline only needs a small read/write contract per concern, so each
//! concern gets its own trait. `LibSqlBackend` implements all three;
//! tests substitute stubs to inject failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{DatabaseError, TemplateError};
use crate::model::email::EmailMessage;
use crate::model::history::SenderHistory;
use crate::model::tone::ToneAnalysis;
use crate::pipeline::lifecycle::MessageStatus;

/// Message persistence.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert a new message. Returns the generated id.
    async fn create_message(&self, message: &EmailMessage) -> Result<String, DatabaseError>;

    /// Overwrite a message's status.
    async fn update_status(&self, id: &str, status: MessageStatus) -> Result<(), DatabaseError>;

    /// Store the analysis, processed date and status in one write.
    /// Saving the same values twice leaves the same stored state.
    async fn save_analysis(
        &self,
        id: &str,
        analysis: &ToneAnalysis,
        processed_date: DateTime<Utc>,
        status: MessageStatus,
    ) -> Result<(), DatabaseError>;

    /// Load a message by id.
    async fn get_message(&self, id: &str) -> Result<Option<EmailMessage>, DatabaseError>;
}

/// Per-sender contact history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Messages from `sender` (compared by normalized address) received
    /// strictly before `before`.
    async fn get_history(
        &self,
        sender: &str,
        before: DateTime<Utc>,
    ) -> Result<SenderHistory, DatabaseError>;
}

/// Source of reply templates.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Template body for `key`, or `TemplateError::NotFound`.
    async fn get_template(&self, key: &str) -> Result<String, TemplateError>;

    /// Every stored template key.
    async fn list_template_keys(&self) -> Result<Vec<String>, TemplateError>;
}
