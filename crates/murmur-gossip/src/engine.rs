//! The dissemination loop body.
//!
//! [`DisseminationEngine::tick`] runs one round:
//!
//! 1. drain the ingestion queue into the [`RumorStore`] (dedup by id)
//! 2. pick up to `fanout` random peers from a fresh membership snapshot
//! 3. send each peer one batch of the rumors eligible for it, marking them
//!    sent only after the transport accepts the batch
//! 4. sweep expired records
//! 5. advance the logical clock
//!
//! The engine owns the store outright; only the queue and the membership
//! view are shared with other threads.

use crate::config::GossipConfig;
use crate::endpoint::Endpoint;
use crate::error::GossipError;
use crate::message::{GossipBatch, Rumor};
use crate::predicate::{ExpiryPredicate, SendEligibility};
use crate::queue::{IngestItem, IngestQueue};
use crate::store::RumorStore;
use crate::transport::{Membership, Transport};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Capacity of the event channel; slow subscribers observe `Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Events emitted by the dissemination loop.
#[derive(Debug, Clone, PartialEq)]
pub enum GossipEvent {
    /// A rumor from a peer was seen here for the first time.
    RumorReceived {
        /// The rumor.
        rumor: Rumor,
        /// The peer that sent it to us.
        from: Endpoint,
    },

    /// A record aged out and was removed.
    RumorExpired {
        /// Id of the removed rumor.
        id: String,
    },
}

/// What happened during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Logical time the tick ran at.
    pub clock: u64,
    /// Rumors inserted into the store.
    pub ingested: usize,
    /// Queued rumors absorbed as duplicates.
    pub duplicates: usize,
    /// Peers selected as recipients.
    pub targets: usize,
    /// Batches accepted by the transport.
    pub envelopes_sent: usize,
    /// Rumor sends recorded across all accepted batches.
    pub rumors_sent: usize,
    /// Batches refused by the transport or that failed to encode.
    pub send_failures: usize,
    /// Records removed by the sweep.
    pub swept: usize,
}

/// Cumulative counters over the engine's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Ticks completed.
    pub ticks: u64,
    /// Rumors inserted into the store.
    pub ingested: u64,
    /// Queued rumors absorbed as duplicates.
    pub duplicates: u64,
    /// Batches accepted by the transport.
    pub envelopes_sent: u64,
    /// Rumor sends recorded.
    pub rumors_sent: u64,
    /// Failed batch sends.
    pub send_failures: u64,
    /// Records removed by sweeps.
    pub swept: u64,
    /// Records live after the last tick.
    pub live_rumors: usize,
}

impl EngineStats {
    fn absorb(&mut self, report: &TickReport, live_rumors: usize) {
        self.ticks += 1;
        self.ingested += report.ingested as u64;
        self.duplicates += report.duplicates as u64;
        self.envelopes_sent += report.envelopes_sent as u64;
        self.rumors_sent += report.rumors_sent as u64;
        self.send_failures += report.send_failures as u64;
        self.swept += report.swept as u64;
        self.live_rumors = live_rumors;
    }
}

/// Drives rumor dissemination for one node.
pub struct DisseminationEngine {
    config: GossipConfig,
    expiry: ExpiryPredicate,
    store: RumorStore,
    /// Logical time; advanced once per tick.
    clock: u64,
    queue: IngestQueue,
    transport: Arc<dyn Transport>,
    membership: Arc<dyn Membership>,
    events: broadcast::Sender<GossipEvent>,
    stats: Arc<Mutex<EngineStats>>,
}

impl fmt::Debug for DisseminationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisseminationEngine")
            .field("local", self.transport.local_endpoint())
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("live_rumors", &self.store.len())
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl DisseminationEngine {
    /// Creates an engine draining `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`GossipError::Config`] if the config fails validation.
    pub fn new(
        config: GossipConfig,
        transport: Arc<dyn Transport>,
        membership: Arc<dyn Membership>,
        queue: IngestQueue,
    ) -> Result<Self, GossipError> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            expiry: config.expiry(),
            config,
            store: RumorStore::new(),
            clock: 0,
            queue,
            transport,
            membership,
            events,
            stats: Arc::new(Mutex::new(EngineStats::default())),
        })
    }

    /// Returns the config.
    #[must_use]
    pub const fn config(&self) -> &GossipConfig {
        &self.config
    }

    /// Returns this node's endpoint.
    #[must_use]
    pub fn local_endpoint(&self) -> &Endpoint {
        self.transport.local_endpoint()
    }

    /// Returns the current logical time.
    #[must_use]
    pub const fn clock(&self) -> u64 {
        self.clock
    }

    /// Returns the rumor store.
    #[must_use]
    pub const fn store(&self) -> &RumorStore {
        &self.store
    }

    /// Returns the ingestion queue.
    #[must_use]
    pub const fn queue(&self) -> &IngestQueue {
        &self.queue
    }

    /// Submits a rumor originated on this node. It is ingested on the next tick.
    pub fn spread(&self, rumor: Rumor) {
        self.queue.push(IngestItem::local(rumor));
    }

    /// Subscribes to engine events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GossipEvent> {
        self.events.subscribe()
    }

    /// Returns the sender side of the event channel.
    #[must_use]
    pub fn event_sender(&self) -> broadcast::Sender<GossipEvent> {
        self.events.clone()
    }

    /// Returns a snapshot of the cumulative counters.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.stats.lock().clone()
    }

    /// Returns the shared counters, for observers outside the loop.
    #[must_use]
    pub fn stats_handle(&self) -> Arc<Mutex<EngineStats>> {
        Arc::clone(&self.stats)
    }

    /// Runs one dissemination round.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport {
            clock: self.clock,
            ..TickReport::default()
        };

        self.ingest(&mut report);

        let targets = self.select_targets();
        report.targets = targets.len();
        for peer in &targets {
            self.send_to(peer, &mut report);
        }

        self.sweep(&mut report);

        self.clock += 1;
        self.stats.lock().absorb(&report, self.store.len());

        debug!(
            local = %self.local_endpoint(),
            clock = report.clock,
            ingested = report.ingested,
            targets = report.targets,
            rumors_sent = report.rumors_sent,
            failures = report.send_failures,
            swept = report.swept,
            live = self.store.len(),
            "gossip tick"
        );
        report
    }

    fn ingest(&mut self, report: &mut TickReport) {
        for item in self.queue.drain() {
            let event = item.originator.clone().map(|from| GossipEvent::RumorReceived {
                rumor: item.rumor.clone(),
                from,
            });

            if self.store.insert(item.rumor, item.originator, self.clock) {
                report.ingested += 1;
                if let Some(event) = event {
                    // No subscribers is fine.
                    let _ = self.events.send(event);
                }
            } else {
                report.duplicates += 1;
            }
        }
    }

    /// Picks at most `fanout` peers, excluding this node.
    fn select_targets(&self) -> Vec<Endpoint> {
        let local = self.local_endpoint();
        let mut candidates: Vec<Endpoint> = self
            .membership
            .current_peers()
            .into_iter()
            .filter(|peer| peer != local)
            .collect();

        if candidates.len() > self.config.fanout {
            let mut rng = rand::thread_rng();
            candidates.shuffle(&mut rng);
            candidates.truncate(self.config.fanout);
        }
        candidates
    }

    fn send_to(&mut self, peer: &Endpoint, report: &mut TickReport) {
        let predicate = SendEligibility::new(peer.clone(), self.config.max_sends);
        let (ids, rumors): (Vec<String>, Vec<Rumor>) = self
            .store
            .all()
            .into_iter()
            .filter(|record| predicate.eligible(record))
            .map(|record| (record.id().to_string(), record.to_rumor()))
            .unzip();

        if rumors.is_empty() {
            trace!(%peer, "nothing eligible");
            return;
        }

        let envelope = match GossipBatch::new(rumors).into_envelope() {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(%peer, error = %e, "failed to encode gossip batch");
                report.send_failures += 1;
                return;
            }
        };

        match self.transport.send(peer, envelope) {
            Ok(()) => {
                report.envelopes_sent += 1;
                for id in &ids {
                    if self.store.record_sent(id, peer) {
                        report.rumors_sent += 1;
                    }
                }
            }
            Err(e) => {
                warn!(%peer, error = %e, rumors = ids.len(), "gossip send failed");
                report.send_failures += 1;
            }
        }
    }

    fn sweep(&mut self, report: &mut TickReport) {
        let removed = self.store.sweep(&self.expiry, self.clock);
        report.swept = removed.len();
        for id in removed {
            trace!(rumor_id = %id, "rumor expired");
            let _ = self.events.send(GossipEvent::RumorExpired { id });
        }
    }
}
