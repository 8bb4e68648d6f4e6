//! libSQL backend: implements the message, history and template stores.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DatabaseError, TemplateError};
use crate::model::email::{EmailMessage, normalize_address};
use crate::model::history::SenderHistory;
use crate::model::tone::ToneAnalysis;
use crate::pipeline::lifecycle::MessageStatus;
use crate::store::migrations;
use crate::store::traits::{HistoryStore, MessageStore, TemplateStore};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(backend.conn()).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(backend.conn()).await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Serialization(format!("bad timestamp {s:?}: {e}")))
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

const MESSAGE_COLUMNS: &str = "id, from_address, to_address, subject, content, received_at, processed_at, tone_analysis, status";

/// Map a libsql Row to an EmailMessage.
fn row_to_message(row: &libsql::Row) -> Result<EmailMessage, DatabaseError> {
    let parse_err = |e: libsql::Error| DatabaseError::Query(format!("row parse: {e}"));

    let status_str: String = row.get(8).map_err(parse_err)?;
    let status = MessageStatus::parse(&status_str).ok_or_else(|| {
        DatabaseError::Serialization(format!("unknown message status {status_str:?}"))
    })?;

    let received_str: String = row.get(5).map_err(parse_err)?;
    let processed_date = row
        .get::<String>(6)
        .ok()
        .map(|s| parse_datetime(&s))
        .transpose()?;
    let tone_analysis = row
        .get::<String>(7)
        .ok()
        .map(|s| serde_json::from_str::<ToneAnalysis>(&s))
        .transpose()
        .map_err(|e| DatabaseError::Serialization(format!("tone_analysis: {e}")))?;

    Ok(EmailMessage {
        id: Some(row.get(0).map_err(parse_err)?),
        from: row.get(1).map_err(parse_err)?,
        to: row.get(2).map_err(parse_err)?,
        subject: row.get(3).ok(),
        content: row.get(4).map_err(parse_err)?,
        received_date: parse_datetime(&received_str)?,
        processed_date,
        tone_analysis,
        status,
    })
}

// ── Trait implementations ───────────────────────────────────────────

#[async_trait]
impl MessageStore for LibSqlBackend {
    async fn create_message(&self, message: &EmailMessage) -> Result<String, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = format_datetime(&Utc::now());
        self.conn()
            .execute(
                "INSERT INTO messages (id, from_address, sender_key, to_address, subject,
                    content, received_at, status, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.clone(),
                    message.from.as_str(),
                    normalize_address(&message.from),
                    message.to.as_str(),
                    opt_text(message.subject.as_deref()),
                    message.content.as_str(),
                    format_datetime(&message.received_date),
                    message.status.as_str(),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_message: {e}")))?;

        debug!(id = %id, "Message inserted into DB");
        Ok(id)
    }

    async fn update_status(&self, id: &str, status: MessageStatus) -> Result<(), DatabaseError> {
        let now = format_datetime(&Utc::now());
        let changed = self
            .conn()
            .execute(
                "UPDATE messages SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), now, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_status: {e}")))?;

        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "message".into(),
                id: id.to_string(),
            });
        }
        debug!(id = id, status = %status, "Message status updated in DB");
        Ok(())
    }

    async fn save_analysis(
        &self,
        id: &str,
        analysis: &ToneAnalysis,
        processed_date: DateTime<Utc>,
        status: MessageStatus,
    ) -> Result<(), DatabaseError> {
        let analysis_json = serde_json::to_string(analysis)
            .map_err(|e| DatabaseError::Serialization(format!("tone_analysis: {e}")))?;
        let now = format_datetime(&Utc::now());

        let changed = self
            .conn()
            .execute(
                "UPDATE messages SET tone_analysis = ?1, processed_at = ?2, status = ?3,
                    updated_at = ?4
                 WHERE id = ?5",
                params![
                    analysis_json,
                    format_datetime(&processed_date),
                    status.as_str(),
                    now,
                    id,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_analysis: {e}")))?;

        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "message".into(),
                id: id.to_string(),
            });
        }
        debug!(id = id, status = %status, "Tone analysis saved");
        Ok(())
    }

    async fn get_message(&self, id: &str) -> Result<Option<EmailMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_message: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_message(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_message: {e}"))),
        }
    }
}

#[async_trait]
impl HistoryStore for LibSqlBackend {
    async fn get_history(
        &self,
        sender: &str,
        before: DateTime<Utc>,
    ) -> Result<SenderHistory, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*), MAX(received_at) FROM messages
                 WHERE sender_key = ?1 AND received_at < ?2",
                params![normalize_address(sender), format_datetime(&before)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_history: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_history: {e}")))?;

        let Some(row) = row else {
            return Ok(SenderHistory::first_contact());
        };
        let count: i64 = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("get_history row parse: {e}")))?;
        let last_contact = row
            .get::<String>(1)
            .ok()
            .map(|s| parse_datetime(&s))
            .transpose()?;

        Ok(SenderHistory::new(
            u32::try_from(count).unwrap_or(u32::MAX),
            last_contact,
        ))
    }
}

#[async_trait]
impl TemplateStore for LibSqlBackend {
    async fn get_template(&self, key: &str) -> Result<String, TemplateError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT body FROM reply_templates WHERE template_key = ?1",
                params![key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_template: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<String>(0)
                .map_err(|e| DatabaseError::Query(format!("get_template row parse: {e}")).into()),
            Ok(None) => Err(TemplateError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(DatabaseError::Query(format!("get_template: {e}")).into()),
        }
    }

    async fn list_template_keys(&self) -> Result<Vec<String>, TemplateError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT template_key FROM reply_templates ORDER BY template_key",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_template_keys: {e}")))?;

        let mut keys = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_template_keys: {e}")))?
        {
            let key = row
                .get::<String>(0)
                .map_err(|e| DatabaseError::Query(format!("list_template_keys row parse: {e}")))?;
            keys.push(key);
        }
        Ok(keys)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::model::email::NewEmail;
    use crate::model::tone::{Emotion, Formality, Sentiment, Urgency};
    use crate::templates::catalog::{BUILTIN_TEMPLATES, TemplateCatalog};

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn make_message(from: &str) -> EmailMessage {
        EmailMessage::received(
            NewEmail::new(from, "support@example.com")
                .with_subject("Order 1234")
                .with_content("My order has a problem"),
        )
    }

    fn make_analysis() -> ToneAnalysis {
        ToneAnalysis::new(
            Sentiment::Negative,
            [(Emotion::Sadness, 0.5), (Emotion::Neutral, 0.3)],
            Urgency::High,
            Formality::Neutral,
            vec!["order".into(), "problem".into()],
            "My order has a problem",
        )
    }

    // ── Message tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let db = test_db().await;
        let msg = make_message("alice@example.com");
        let id = db.create_message(&msg).await.unwrap();

        let fetched = db.get_message(&id).await.unwrap().unwrap();
        assert_eq!(fetched.id.as_deref(), Some(id.as_str()));
        assert_eq!(fetched.from, "alice@example.com");
        assert_eq!(fetched.subject.as_deref(), Some("Order 1234"));
        assert_eq!(fetched.content, "My order has a problem");
        assert_eq!(fetched.received_date, msg.received_date);
        assert_eq!(fetched.status, MessageStatus::Received);
        assert!(fetched.tone_analysis.is_none());
        assert!(fetched.processed_date.is_none());
    }

    #[tokio::test]
    async fn create_without_subject_or_body() {
        let db = test_db().await;
        let msg = EmailMessage::received(NewEmail::new("a@example.com", "b@example.com"));
        let id = db.create_message(&msg).await.unwrap();

        let fetched = db.get_message(&id).await.unwrap().unwrap();
        assert!(fetched.subject.is_none());
        assert_eq!(fetched.content, "");
    }

    #[tokio::test]
    async fn get_message_not_found() {
        let db = test_db().await;
        assert!(db.get_message("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_status_persists() {
        let db = test_db().await;
        let id = db.create_message(&make_message("a@example.com")).await.unwrap();

        db.update_status(&id, MessageStatus::Processing).await.unwrap();
        let fetched = db.get_message(&id).await.unwrap().unwrap();
        assert_eq!(fetched.status, MessageStatus::Processing);
    }

    #[tokio::test]
    async fn update_status_unknown_id_errors() {
        let db = test_db().await;
        let err = db
            .update_status("missing", MessageStatus::Error)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn save_analysis_is_idempotent() {
        let db = test_db().await;
        let id = db.create_message(&make_message("a@example.com")).await.unwrap();
        let analysis = make_analysis();
        let processed = Utc::now();

        db.save_analysis(&id, &analysis, processed, MessageStatus::Processed)
            .await
            .unwrap();
        let first = db.get_message(&id).await.unwrap().unwrap();

        db.save_analysis(&id, &analysis, processed, MessageStatus::Processed)
            .await
            .unwrap();
        let second = db.get_message(&id).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(second.tone_analysis, Some(analysis));
        assert_eq!(second.status, MessageStatus::Processed);
        assert_eq!(
            second.processed_date.map(|d| d.timestamp_micros()),
            Some(processed.timestamp_micros())
        );
    }

    // ── History tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn history_first_contact() {
        let db = test_db().await;
        let history = db.get_history("nobody@example.com", Utc::now()).await.unwrap();
        assert_eq!(history, SenderHistory::first_contact());
    }

    #[tokio::test]
    async fn history_counts_prior_messages_only() {
        let db = test_db().await;
        let base = Utc::now() - Duration::hours(3);

        for offset in 0..3 {
            let mut msg = make_message("Alice <ALICE@example.com>");
            msg.received_date = base + Duration::hours(offset);
            db.create_message(&msg).await.unwrap();
        }
        db.create_message(&make_message("bob@example.com")).await.unwrap();

        let cutoff = base + Duration::hours(2);
        let history = db.get_history("alice@example.com", cutoff).await.unwrap();
        assert_eq!(history.prior_count, 2);
        assert_eq!(
            history.last_contact.map(|d| d.timestamp_micros()),
            Some((base + Duration::hours(1)).timestamp_micros())
        );

        let all = db.get_history("alice@example.com", Utc::now()).await.unwrap();
        assert_eq!(all.prior_count, 3);
    }

    // ── Template tests ──────────────────────────────────────────────

    #[tokio::test]
    async fn builtin_templates_seeded() {
        let db = test_db().await;
        let keys = db.list_template_keys().await.unwrap();
        assert_eq!(keys.len(), BUILTIN_TEMPLATES.len());
        assert!(keys.iter().any(|k| k == "default"));

        let body = db.get_template("urgent_critical").await.unwrap();
        assert!(body.contains("{{SENDER_NAME}}"));
    }

    #[tokio::test]
    async fn get_template_unknown_is_not_found() {
        let db = test_db().await;
        let err = db.get_template("nope").await.unwrap_err();
        assert!(matches!(err, TemplateError::NotFound { .. }));
    }

    #[tokio::test]
    async fn template_keys_sorted_and_complete() {
        let db = test_db().await;
        let keys = db.list_template_keys().await.unwrap();
        let mut expected: Vec<String> = BUILTIN_TEMPLATES.iter().map(|(k, _)| k.to_string()).collect();
        expected.sort();
        assert_eq!(keys, expected);
    }

    #[tokio::test]
    async fn unreadable_template_row_is_an_error() {
        let db = test_db().await;
        // Non-INTEGER primary keys accept NULL in SQLite.
        db.conn()
            .execute(
                "INSERT INTO reply_templates (template_key, body) VALUES (NULL, 'orphan')",
                (),
            )
            .await
            .unwrap();

        let err = db.list_template_keys().await.unwrap_err();
        assert!(matches!(err, TemplateError::Store(DatabaseError::Query(_))));

        let err = TemplateCatalog::load(&db).await.unwrap_err();
        assert!(matches!(err, TemplateError::Store(_)));
    }

    #[tokio::test]
    async fn local_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tone.db");
        let id = {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.create_message(&make_message("a@example.com")).await.unwrap()
        };
        let reopened = LibSqlBackend::new_local(&path).await.unwrap();
        assert!(reopened.get_message(&id).await.unwrap().is_some());
    }
}
