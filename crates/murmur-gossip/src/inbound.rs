//! Routing and unpacking of inbound gossip batches.
//!
//! Inbound envelopes are classified by qualifier, decoded as a whole, and
//! split into one [`IngestItem`] per rumor. Nothing here touches the rumor
//! store; deduplication happens when the dissemination loop drains the queue.

use crate::error::GossipError;
use crate::message::{Envelope, GossipBatch, Rumor, GOSSIP_BATCH_QUALIFIER};
use crate::queue::{IngestItem, IngestQueue};
use crate::transport::MessageListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Recognizes envelopes owned by the gossip subsystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageClassifier;

impl MessageClassifier {
    /// Returns true if the envelope carries a gossip batch.
    #[must_use]
    pub fn accepts(&self, envelope: &Envelope) -> bool {
        envelope.qualifier == GOSSIP_BATCH_QUALIFIER
    }
}

/// Unpacks gossip batches onto the ingestion queue.
#[derive(Debug, Clone)]
pub struct InboundRequestHandler {
    queue: IngestQueue,
}

impl InboundRequestHandler {
    /// Creates a handler feeding `queue`.
    #[must_use]
    pub const fn new(queue: IngestQueue) -> Self {
        Self { queue }
    }

    /// Returns the queue this handler feeds.
    #[must_use]
    pub const fn queue(&self) -> &IngestQueue {
        &self.queue
    }

    /// Decodes the batch and enqueues every rumor in batch order.
    ///
    /// Returns the enqueued rumors. Duplicates are passed through.
    ///
    /// # Errors
    ///
    /// Returns [`GossipError::Decode`] if the batch is malformed, in which
    /// case nothing is enqueued.
    pub fn handle(&self, envelope: &Envelope) -> Result<Vec<Rumor>, GossipError> {
        let batch = GossipBatch::from_envelope(envelope)?;
        let originator = envelope.sender.clone();

        self.queue.push_all(batch.rumors.iter().map(|rumor| IngestItem {
            rumor: rumor.clone(),
            originator: originator.clone(),
        }));

        Ok(batch.rumors)
    }
}

/// Transport listener wiring the classifier to the handler.
///
/// Decode failures are logged and the envelope dropped; they never reach the
/// transport. A closed listener accepts nothing, so a stopped node stops
/// queueing work.
#[derive(Debug, Clone)]
pub struct GossipListener {
    classifier: MessageClassifier,
    handler: InboundRequestHandler,
    open: Arc<AtomicBool>,
}

impl GossipListener {
    /// Creates an open listener feeding `queue`.
    #[must_use]
    pub fn new(queue: IngestQueue) -> Self {
        Self {
            classifier: MessageClassifier,
            handler: InboundRequestHandler::new(queue),
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Stops accepting envelopes. Clones share the flag.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Returns true until [`close`](Self::close) is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl MessageListener for GossipListener {
    fn accepts(&self, envelope: &Envelope) -> bool {
        self.is_open() && self.classifier.accepts(envelope)
    }

    fn on_message(&self, envelope: Envelope) {
        let sender = envelope
            .sender
            .as_ref()
            .map_or_else(|| "<local>".to_string(), ToString::to_string);

        match self.handler.handle(&envelope) {
            Ok(rumors) => debug!(%sender, count = rumors.len(), "queued inbound gossip"),
            Err(e) => warn!(%sender, error = %e, "dropping malformed gossip batch"),
        }
    }
}
