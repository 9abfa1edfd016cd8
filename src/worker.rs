/*!
 * Provider workers.
 *
 * A worker drains one provider queue: for every message it translates the
 * title and text concurrently, checksums the result and stores it through
 * the pipeline. Messages are acknowledged only after the translation is
 * stored, so a failed message is redelivered once its visibility timeout
 * expires.
 */

use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::checksum::{Checksum, ChecksumFields};
use crate::errors::HandlerError;
use crate::pipeline::{FirstSubmission, PipelineService};
use crate::providers::{Translator, translate_long};
use crate::queue::{QueueMessage, ReceivedMessage};

/// Outcome of one poll
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// Messages received
    pub received: usize,
    /// Messages translated, stored and acknowledged
    pub stored: usize,
    /// Messages left on the queue for redelivery
    pub failed: usize,
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} received, {} stored, {} failed", self.received, self.stored, self.failed)
    }
}

/// Consumer of a single provider queue
pub struct TranslationWorker {
    translator: Arc<dyn Translator>,
    pipeline: PipelineService,
    queue_name: String,
    max_messages: usize,
    poll_interval: Duration,
}

impl TranslationWorker {
    pub fn new(translator: Arc<dyn Translator>, pipeline: PipelineService) -> Self {
        let queue_config = pipeline.config().queue.clone();
        Self {
            queue_name: translator.provider().queue_name(),
            translator,
            pipeline,
            max_messages: queue_config.max_messages,
            poll_interval: Duration::from_millis(queue_config.poll_interval_ms),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Translate a message into a checksummed first-pass submission
    pub async fn translate_message(&self, message: &QueueMessage) -> Result<FirstSubmission, HandlerError> {
        let translator = self.translator.as_ref();
        let (from, to) = (message.from_lang.as_str(), message.to_lang.as_str());

        let translate_title = async {
            match message.title.as_deref() {
                Some(title) => translate_long(translator, title, from, to).await.map(Some),
                None => Ok(None),
            }
        };
        let (title, text) = tokio::try_join!(translate_title, translate_long(translator, &message.text, from, to))?;

        let checksum = Checksum::compute(&ChecksumFields::FirstPass {
            text: Some(&text),
            id: message.id,
        });

        Ok(FirstSubmission {
            id: message.id,
            title,
            text: Some(text),
            checksum: checksum.to_hex(),
            providers_id: self.translator.provider().id(),
            lang_from: Some(message.from_lang.clone()),
            lang_to: Some(message.to_lang.clone()),
        })
    }

    async fn process_message(&self, received: &ReceivedMessage) -> Result<(), HandlerError> {
        let message = QueueMessage::from_body(&received.body)?;
        debug!(
            "{} translating article {} ({} -> {}), delivery {}",
            self.translator.provider(),
            message.id,
            message.from_lang,
            message.to_lang,
            received.receive_count
        );

        let submission = self.translate_message(&message).await?;
        let outcome = self.pipeline.put_first_translation(submission).await?;
        info!("{} article {}: {}", self.translator.provider(), message.id, outcome.message);

        self.pipeline.queue().delete(&self.queue_name, &received.receipt).await?;
        Ok(())
    }

    /// Receive and process one batch of messages
    pub async fn process_batch(&self) -> Result<BatchReport, HandlerError> {
        let messages = self.pipeline.queue().receive(&self.queue_name, self.max_messages).await?;

        let mut report = BatchReport {
            received: messages.len(),
            ..Default::default()
        };
        for received in &messages {
            match self.process_message(received).await {
                Ok(()) => report.stored += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        "{} failed to process message (delivery {}): {}",
                        self.translator.provider(),
                        received.receive_count,
                        e
                    );
                }
            }
        }

        Ok(report)
    }

    /// Poll until `shutdown` turns true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Worker for {} polling queue '{}'", self.translator.provider(), self.queue_name);

        while !*shutdown.borrow() {
            let idle = match self.process_batch().await {
                Ok(report) if report.received > 0 => {
                    info!("{}: {}", self.translator.provider(), report);
                    false
                }
                Ok(_) => true,
                Err(e) => {
                    error!("{} poll failed: {}", self.translator.provider(), e);
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }

        info!("Worker for {} stopped", self.translator.provider());
    }
}
