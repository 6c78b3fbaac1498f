//! Host-facing entry point: start, spread, stop.

use crate::config::GossipConfig;
use crate::endpoint::Endpoint;
use crate::engine::{DisseminationEngine, EngineStats, GossipEvent};
use crate::error::GossipError;
use crate::inbound::GossipListener;
use crate::message::Rumor;
use crate::queue::{IngestItem, IngestQueue};
use crate::transport::{Membership, Transport};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Binds the dissemination core to its collaborators.
#[derive(Clone)]
pub struct GossipService {
    transport: Arc<dyn Transport>,
    membership: Arc<dyn Membership>,
}

impl std::fmt::Debug for GossipService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GossipService")
            .field("local", self.transport.local_endpoint())
            .finish_non_exhaustive()
    }
}

impl GossipService {
    /// Creates a service over the given transport and membership view.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, membership: Arc<dyn Membership>) -> Self {
        Self {
            transport,
            membership,
        }
    }

    /// Validates `config`, subscribes to the transport and spawns the tick loop.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`GossipError::Config`] if the config is invalid or there is no
    /// runtime to spawn on. Nothing is started in that case.
    pub fn start(&self, config: GossipConfig) -> Result<GossipHandle, GossipError> {
        let queue = IngestQueue::new();
        let engine = DisseminationEngine::new(
            config,
            Arc::clone(&self.transport),
            Arc::clone(&self.membership),
            queue.clone(),
        )?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| GossipError::Config(format!("no tokio runtime: {e}")))?;

        let listener = GossipListener::new(queue.clone());
        self.transport.subscribe(Arc::new(listener.clone()));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = GossipHandle {
            local: engine.local_endpoint().clone(),
            queue,
            events: engine.event_sender(),
            stats: engine.stats_handle(),
            listener,
            shutdown: shutdown_tx,
            task: Some(runtime.spawn(run_loop(engine, shutdown_rx))),
        };
        Ok(handle)
    }
}

/// Ticks `engine` every period until shutdown is signalled.
///
/// A tick always runs to completion; shutdown is observed between ticks.
async fn run_loop(mut engine: DisseminationEngine, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(engine.config().tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        local = %engine.local_endpoint(),
        period = ?engine.config().tick_period,
        fanout = engine.config().fanout,
        max_sends = engine.config().max_sends,
        "gossip loop started"
    );

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                engine.tick();
            }
        }
    }

    info!(
        local = %engine.local_endpoint(),
        clock = engine.clock(),
        live = engine.store().len(),
        "gossip loop stopped"
    );
}

/// Handle to a running dissemination loop.
///
/// Dropping the handle also stops the loop, without waiting for it.
#[derive(Debug)]
pub struct GossipHandle {
    local: Endpoint,
    queue: IngestQueue,
    events: broadcast::Sender<GossipEvent>,
    stats: Arc<Mutex<EngineStats>>,
    listener: GossipListener,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl GossipHandle {
    /// Returns this node's endpoint.
    #[must_use]
    pub const fn local_endpoint(&self) -> &Endpoint {
        &self.local
    }

    /// Submits a self-originated rumor for dissemination.
    ///
    /// # Errors
    ///
    /// Returns [`GossipError::NotRunning`] once the loop has been stopped.
    pub fn spread(&self, rumor: Rumor) -> Result<(), GossipError> {
        if !self.is_running() {
            return Err(GossipError::NotRunning);
        }
        self.queue.push(IngestItem::local(rumor));
        Ok(())
    }

    /// Subscribes to rumor events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GossipEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the loop's cumulative counters.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.stats.lock().clone()
    }

    /// Returns true while the loop accepts work.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !*self.shutdown.borrow() && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops the loop and waits for the in-flight tick to finish.
    pub async fn stop(mut self) {
        self.listener.close();
        // The receiver lives as long as the loop; a send error means it already exited.
        let _ = self.shutdown.send(true);

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(local = %self.local, error = %e, "gossip loop terminated abnormally");
            }
        }
    }
}

impl Drop for GossipHandle {
    fn drop(&mut self) {
        self.listener.close();
        let _ = self.shutdown.send(true);
    }
}
