//! End-to-end tests for the reply pipeline.
//!
//! Each test opens a fresh on-disk libSQL database, feeds messages through
//! `ReplyPipeline`, and checks both the outcome and what was persisted.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tone_responder::channels::{OutboundReply, ReplyTransport, parse_raw_email};
use tone_responder::classifier::{FallbackAnalyzer, KeywordClassifier, ToneAnalyzer};
use tone_responder::config::PipelineConfig;
use tone_responder::error::{ClassificationError, Error, PipelineError, TransportError};
use tone_responder::model::{NewEmail, Sentiment, ToneAnalysis, Urgency};
use tone_responder::pipeline::{MessageStatus, ReplyDecision, ReplyPipeline};
use tone_responder::store::{HistoryStore, LibSqlBackend, MessageStore};
use tone_responder::templates::{TemplateCatalog, TemplateKey};

/// Captures replies instead of sending them.
#[derive(Default)]
struct CapturingTransport {
    sent: Mutex<Vec<OutboundReply>>,
}

#[async_trait]
impl ReplyTransport for CapturingTransport {
    fn name(&self) -> &str {
        "capture"
    }

    async fn send_reply(&self, reply: &OutboundReply) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(reply.clone());
        Ok(())
    }
}

struct OfflineAnalyzer;

#[async_trait]
impl ToneAnalyzer for OfflineAnalyzer {
    fn name(&self) -> &str {
        "offline"
    }

    async fn analyze(&self, _text: &str) -> Result<ToneAnalysis, ClassificationError> {
        Err(ClassificationError::Failed {
            analyzer: "offline".into(),
            reason: "service unavailable".into(),
        })
    }
}

struct Setup {
    _dir: tempfile::TempDir,
    db: Arc<LibSqlBackend>,
    transport: Arc<CapturingTransport>,
}

impl Setup {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(
            LibSqlBackend::new_local(&dir.path().join("tone.db"))
                .await
                .unwrap(),
        );
        Self {
            _dir: dir,
            db,
            transport: Arc::new(CapturingTransport::default()),
        }
    }

    async fn pipeline(&self) -> ReplyPipeline {
        let catalog = TemplateCatalog::load(self.db.as_ref()).await.unwrap();
        self.pipeline_with(Arc::new(KeywordClassifier::default()), catalog)
    }

    fn pipeline_with(&self, analyzer: Arc<dyn ToneAnalyzer>, catalog: TemplateCatalog) -> ReplyPipeline {
        ReplyPipeline::new(
            self.db.clone(),
            self.db.clone(),
            analyzer,
            Arc::new(catalog),
            self.transport.clone(),
            &PipelineConfig::default(),
        )
    }

    fn sent(&self) -> Vec<OutboundReply> {
        self.transport.sent.lock().unwrap().clone()
    }
}

fn from_alice(subject: &str, content: &str) -> NewEmail {
    NewEmail::new("Alice Smith <alice@example.com>", "support@example.com")
        .with_subject(subject)
        .with_content(content)
}

#[tokio::test]
async fn urgent_request_is_answered() {
    let setup = Setup::new().await;
    let pipeline = setup.pipeline().await;

    let outcome = pipeline
        .process(from_alice("Login", "This is urgent, please help ASAP"))
        .await
        .unwrap();

    let analysis = outcome.message.tone_analysis.clone().unwrap();
    assert_eq!(analysis.urgency(), Urgency::High);
    assert_eq!(outcome.message.status, MessageStatus::Replied);
    assert!(matches!(
        outcome.decision,
        ReplyDecision::Replied {
            template: TemplateKey::Default,
            ..
        }
    ));

    let sent = setup.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "Alice Smith <alice@example.com>");
    assert_eq!(sent[0].subject, "Re: Login");
    assert!(sent[0].body.contains("Hello Alice Smith"));
    assert!(sent[0].body.contains("\"Login\""));

    let stored = setup
        .db
        .get_message(outcome.message.id.as_deref().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, outcome.message);
}

#[tokio::test]
async fn praise_is_not_answered() {
    let setup = Setup::new().await;
    let pipeline = setup.pipeline().await;

    let outcome = pipeline
        .process(from_alice("Feedback", "Thanks, great service!"))
        .await
        .unwrap();

    assert_eq!(
        outcome.message.tone_analysis.as_ref().unwrap().sentiment(),
        Sentiment::Positive
    );
    assert_eq!(outcome.decision, ReplyDecision::NoReply);
    assert_eq!(outcome.message.status, MessageStatus::Processed);
    assert!(setup.sent().is_empty());
}

#[tokio::test]
async fn empty_body_gets_default_analysis() {
    let setup = Setup::new().await;
    let pipeline = setup.pipeline().await;

    let outcome = pipeline.process(from_alice("(blank)", "")).await.unwrap();

    let analysis = outcome.message.tone_analysis.as_ref().unwrap();
    assert_eq!(analysis, &ToneAnalysis::neutral_default());
    assert_eq!(outcome.decision, ReplyDecision::NoReply);
    assert!(setup.sent().is_empty());
}

#[tokio::test]
async fn frequent_sender_template_after_many_messages() {
    let setup = Setup::new().await;
    let pipeline = setup.pipeline().await;

    for n in 0..5 {
        pipeline
            .process(from_alice(&format!("Note {n}"), "just checking in"))
            .await
            .unwrap();
    }

    let outcome = pipeline
        .process(from_alice("Deploy", "Need this urgent"))
        .await
        .unwrap();
    let ReplyDecision::Replied { template, reply } = outcome.decision else {
        panic!("expected a reply");
    };
    assert_eq!(template, TemplateKey::FrequentSender);
    assert!(reply.body.contains("message 6"));
}

#[tokio::test]
async fn repeated_complaint_is_escalated() {
    let setup = Setup::new().await;
    let pipeline = setup.pipeline().await;

    pipeline
        .process(from_alice("Order", "Where is my order?"))
        .await
        .unwrap();
    let outcome = pipeline
        .process(NewEmail::new("ALICE@example.com", "support@example.com")
            .with_subject("Order")
            .with_content("There is a problem with my order"))
        .await
        .unwrap();

    let ReplyDecision::Replied { template, reply } = outcome.decision else {
        panic!("expected a reply");
    };
    assert_eq!(template, TemplateKey::NegativeRepeated);
    assert!(reply.body.contains("message 2"));
    assert!(!reply.body.contains("{{"));

    let history = setup
        .db
        .get_history("alice@example.com", outcome.message.received_date)
        .await
        .unwrap();
    assert_eq!(history.prior_count, 1);
}

#[tokio::test]
async fn critical_without_template_stays_processed() {
    let setup = Setup::new().await;
    let pipeline = setup.pipeline_with(
        Arc::new(KeywordClassifier::default()),
        TemplateCatalog::new([("default", "Hello {{SENDER_NAME}}")]),
    );

    let err = pipeline
        .process(from_alice("Outage", "Critical: production is down"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Pipeline(PipelineError::Template(_))));
    assert!(setup.sent().is_empty());

    let history = setup
        .db
        .get_history("alice@example.com", chrono::Utc::now())
        .await
        .unwrap();
    assert_eq!(history.prior_count, 1);
}

#[tokio::test]
async fn analyzer_outage_marks_error_unless_wrapped() {
    let setup = Setup::new().await;

    let strict = setup.pipeline_with(Arc::new(OfflineAnalyzer), TemplateCatalog::builtin());
    let err = strict
        .process(from_alice("Help", "urgent"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Pipeline(PipelineError::Classification(_))
    ));

    let lenient = setup.pipeline_with(
        Arc::new(FallbackAnalyzer::new(OfflineAnalyzer)),
        TemplateCatalog::builtin(),
    );
    let outcome = lenient.process(from_alice("Help", "urgent")).await.unwrap();
    assert_eq!(outcome.decision, ReplyDecision::NoReply);
    assert_eq!(
        outcome.message.tone_analysis,
        Some(ToneAnalysis::neutral_default())
    );
}

#[tokio::test]
async fn raw_message_flows_through_pipeline() {
    let setup = Setup::new().await;
    let pipeline = setup.pipeline().await;

    let raw = "From: Bob Jones <bob@example.com>\r\n\
        To: support@example.com\r\n\
        Subject: Refund\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        I am frustrated, this is the third error this week.\r\n";
    let email = parse_raw_email(raw.as_bytes()).unwrap();

    let outcome = pipeline.process(email).await.unwrap();
    assert_eq!(outcome.message.status, MessageStatus::Replied);
    assert_eq!(setup.sent()[0].subject, "Re: Refund");
    assert!(setup.sent()[0].body.contains("Hello Bob Jones"));
}
