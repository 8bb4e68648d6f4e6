//! Reply pipeline: classifies inbound messages and sends canned replies.
//!
//! Flow:
//! 1. Lifecycle: persist in RECEIVED, move to PROCESSING
//! 2. Tone analysis → PROCESSED (analysis persisted)
//! 3. Reply policy; stop here when no reply is warranted
//! 4. Sender history → template selection → placeholder rendering
//! 5. Outbound send → REPLIED
//!
//! Any failure moves the message to ERROR, except a missing template,
//! which withholds the reply and leaves the message PROCESSED.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::channels::{OutboundReply, ReplyTransport};
use crate::classifier::ToneAnalyzer;
use crate::config::PipelineConfig;
use crate::error::{Error, LifecycleError, PipelineError};
use crate::model::email::{EmailMessage, NewEmail};
use crate::pipeline::lifecycle::MessageLifecycle;
use crate::pipeline::policy::should_auto_reply;
use crate::store::traits::{HistoryStore, MessageStore};
use crate::templates::{Placeholders, TemplateCatalog, TemplateKey, TemplateSelector, render};

/// What the pipeline decided for one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReplyDecision {
    /// A reply was rendered from `template` and delivered.
    Replied {
        template: TemplateKey,
        reply: OutboundReply,
    },
    /// The tone did not warrant an automatic reply.
    NoReply,
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingOutcome {
    pub message: EmailMessage,
    #[serde(flatten)]
    pub decision: ReplyDecision,
}

/// The reply pipeline.
///
/// Holds only shared, immutable collaborators, so one instance can drive
/// any number of messages concurrently.
pub struct ReplyPipeline {
    lifecycle: MessageLifecycle,
    analyzer: Arc<dyn ToneAnalyzer>,
    history: Arc<dyn HistoryStore>,
    catalog: Arc<TemplateCatalog>,
    selector: TemplateSelector,
    transport: Arc<dyn ReplyTransport>,
    max_concurrent: usize,
    process_timeout: Duration,
}

impl ReplyPipeline {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        history: Arc<dyn HistoryStore>,
        analyzer: Arc<dyn ToneAnalyzer>,
        catalog: Arc<TemplateCatalog>,
        transport: Arc<dyn ReplyTransport>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            lifecycle: MessageLifecycle::new(messages),
            analyzer,
            history,
            catalog,
            selector: TemplateSelector::with_frequent_threshold(config.frequent_threshold),
            transport,
            max_concurrent: config.max_concurrent.max(1),
            process_timeout: config.process_timeout,
        }
    }

    /// Validate, persist and process a single inbound message.
    ///
    /// Invalid input is rejected with `Error::Validation` before anything
    /// is stored; every other failure is an `Error::Pipeline`.
    pub async fn process(&self, new: NewEmail) -> Result<ProcessingOutcome, Error> {
        new.validate()?;
        let message = self.lifecycle.receive(new).await?;
        Ok(self.run(message).await?)
    }

    /// Like [`process`](Self::process), bounded by the configured timeout.
    /// Expiry moves the message to ERROR and returns `PipelineError::Timeout`.
    pub async fn process_with_timeout(&self, new: NewEmail) -> Result<ProcessingOutcome, Error> {
        new.validate()?;
        let message = self.lifecycle.receive(new).await?;
        Ok(self.run_with_timeout(message).await?)
    }

    /// [`run`](Self::run) bounded by the configured timeout. On expiry the
    /// stored message is reloaded and moved to ERROR.
    pub async fn run_with_timeout(
        &self,
        message: EmailMessage,
    ) -> Result<ProcessingOutcome, PipelineError> {
        let id = message.id.clone().ok_or(LifecycleError::NotPersisted)?;

        match tokio::time::timeout(self.process_timeout, self.run(message)).await {
            Ok(result) => result,
            Err(_) => {
                let err = PipelineError::Timeout(self.process_timeout);
                match self.lifecycle.reload(&id).await {
                    Ok(mut stored) => self.fail_quietly(&mut stored, &err).await,
                    Err(e) => warn!(id = %id, error = %e, "Could not reload timed-out message"),
                }
                Err(err)
            }
        }
    }

    /// Process a batch of messages concurrently.
    ///
    /// Each message is independent; a failure on one never affects another.
    /// Results are returned in input order.
    pub async fn process_batch(
        &self,
        messages: Vec<NewEmail>,
    ) -> Vec<Result<ProcessingOutcome, Error>> {
        let count = messages.len();
        info!(count, max_concurrent = self.max_concurrent, "Processing message batch");

        let mut results: Vec<(usize, Result<ProcessingOutcome, Error>)> =
            stream::iter(messages.into_iter().enumerate())
                .map(|(idx, new)| async move { (idx, self.process_with_timeout(new).await) })
                .buffer_unordered(self.max_concurrent)
                .collect()
                .await;
        results.sort_by_key(|(idx, _)| *idx);

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        for (idx, result) in &results {
            if let Err(e) = result {
                error!(index = idx, error = %e, "Failed to process message in batch");
            }
        }
        info!(
            processed = count - failed,
            failed,
            total = count,
            "Batch processing complete"
        );

        results.into_iter().map(|(_, r)| r).collect()
    }

    /// Drive an already-received message to a terminal outcome.
    pub async fn run(&self, mut message: EmailMessage) -> Result<ProcessingOutcome, PipelineError> {
        info!(id = %message.id_str(), from = %message.from, "Processing inbound message");

        match self.advance(&mut message).await {
            Ok(decision) => Ok(ProcessingOutcome { message, decision }),
            Err(PipelineError::Template(e)) => {
                warn!(
                    id = %message.id_str(),
                    status = %message.status,
                    error = %e,
                    "Reply withheld: template unavailable"
                );
                Err(PipelineError::Template(e))
            }
            Err(e) => {
                self.fail_quietly(&mut message, &e).await;
                Err(e)
            }
        }
    }

    async fn advance(&self, message: &mut EmailMessage) -> Result<ReplyDecision, PipelineError> {
        self.lifecycle.begin_processing(message).await?;

        let analysis = self.analyzer.analyze(&message.content).await?;
        debug!(
            id = %message.id_str(),
            analyzer = self.analyzer.name(),
            sentiment = %analysis.sentiment(),
            urgency = %analysis.urgency(),
            "Tone analyzed"
        );
        self.lifecycle.complete_processing(message, analysis).await?;

        if !should_auto_reply(message.tone_analysis.as_ref()) {
            info!(id = %message.id_str(), "No automatic reply warranted");
            return Ok(ReplyDecision::NoReply);
        }

        let reply_to = message.id.clone().ok_or(LifecycleError::NotPersisted)?;
        let analysis = message
            .tone_analysis
            .as_ref()
            .ok_or(LifecycleError::MissingAnalysis { id: reply_to })?;

        let history = self
            .history
            .get_history(&message.from, message.received_date)
            .await?;
        let template = self.selector.select(analysis, &history);
        let body = render(
            self.catalog.get(template.as_str())?,
            &Placeholders::for_reply(message, &history),
        );
        let reply = OutboundReply::to_message(message, body);

        self.transport.send_reply(&reply).await?;
        self.lifecycle.mark_replied(message).await?;

        info!(
            id = %message.id_str(),
            template = %template,
            transport = self.transport.name(),
            prior_count = history.prior_count,
            "Reply sent"
        );
        Ok(ReplyDecision::Replied { template, reply })
    }

    /// Best-effort move to ERROR; the original error is what the caller sees.
    async fn fail_quietly(&self, message: &mut EmailMessage, cause: &PipelineError) {
        if message.status.is_terminal() {
            return;
        }
        if let Err(e) = self.lifecycle.fail(message, &cause.to_string()).await {
            warn!(
                id = %message.id_str(),
                error = %e,
                cause = %cause,
                "Failed to record error status"
            );
        }
    }
}
