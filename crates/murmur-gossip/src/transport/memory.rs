//! In-process transport hub.
//!
//! Every bound endpoint gets a [`MemoryTransport`]; sends are delivered by
//! calling the destination's listeners directly, or on the tokio runtime
//! when the link is delayed.

use super::{LinkSettings, Membership, MessageListener, NetworkEmulator, Transport};
use crate::endpoint::Endpoint;
use crate::error::GossipError;
use crate::message::Envelope;
use parking_lot::RwLock;
use rand::Rng;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

type Listeners = Vec<Arc<dyn MessageListener>>;

#[derive(Default)]
struct NetworkInner {
    nodes: RwLock<HashMap<Endpoint, Listeners>>,
    emulator: NetworkEmulator,
}

/// A process-local network connecting [`MemoryTransport`]s.
///
/// Doubles as a [`Membership`] view listing every bound endpoint.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<NetworkInner>,
}

impl fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryNetwork")
            .field("nodes", &self.inner.nodes.read().len())
            .field("emulator", &self.inner.emulator)
            .finish()
    }
}

impl MemoryNetwork {
    /// Creates a network with its own emulator table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a network that applies `emulator` to every send.
    #[must_use]
    pub fn with_emulator(emulator: NetworkEmulator) -> Self {
        Self {
            inner: Arc::new(NetworkInner {
                nodes: RwLock::new(HashMap::new()),
                emulator,
            }),
        }
    }

    /// Returns the emulator table.
    #[must_use]
    pub fn emulator(&self) -> &NetworkEmulator {
        &self.inner.emulator
    }

    /// Attaches `endpoint` to the network.
    #[must_use]
    pub fn bind(&self, endpoint: Endpoint) -> MemoryTransport {
        self.inner.nodes.write().entry(endpoint.clone()).or_default();
        MemoryTransport {
            local: endpoint,
            network: self.clone(),
        }
    }

    /// Detaches `endpoint`; later sends to it fail.
    pub fn unbind(&self, endpoint: &Endpoint) -> bool {
        self.inner.nodes.write().remove(endpoint).is_some()
    }

    /// Number of bound endpoints.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.nodes.read().len()
    }

    fn listeners(&self, endpoint: &Endpoint) -> Option<Listeners> {
        self.inner.nodes.read().get(endpoint).cloned()
    }

    fn add_listener(&self, endpoint: &Endpoint, listener: Arc<dyn MessageListener>) {
        self.inner
            .nodes
            .write()
            .entry(endpoint.clone())
            .or_default()
            .push(listener);
    }
}

impl Membership for MemoryNetwork {
    fn current_peers(&self) -> Vec<Endpoint> {
        self.inner.nodes.read().keys().cloned().collect()
    }
}

/// One endpoint's handle on a [`MemoryNetwork`].
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    local: Endpoint,
    network: MemoryNetwork,
}

impl MemoryTransport {
    /// Returns the network this transport is bound to.
    #[must_use]
    pub const fn network(&self) -> &MemoryNetwork {
        &self.network
    }

    fn should_drop(settings: &LinkSettings) -> bool {
        settings.loss_percent > 0 && rand::thread_rng().gen_range(0..100u8) < settings.loss_percent
    }
}

fn deliver(listeners: &[Arc<dyn MessageListener>], envelope: &Envelope) {
    for listener in listeners {
        if listener.accepts(envelope) {
            listener.on_message(envelope.clone());
        }
    }
}

impl Transport for MemoryTransport {
    fn local_endpoint(&self) -> &Endpoint {
        &self.local
    }

    fn send(&self, peer: &Endpoint, envelope: Envelope) -> Result<(), GossipError> {
        let settings = self.network.emulator().get(peer);
        if settings.blocked {
            return Err(GossipError::Transport {
                peer: peer.clone(),
                reason: "link blocked".to_string(),
            });
        }

        let listeners = self.network.listeners(peer).ok_or_else(|| GossipError::Transport {
            peer: peer.clone(),
            reason: "endpoint not bound".to_string(),
        })?;

        if Self::should_drop(&settings) {
            trace!(from = %self.local, to = %peer, "emulated loss");
            return Ok(());
        }

        let envelope = envelope.with_sender(self.local.clone());

        if settings.delay.is_zero() {
            deliver(&listeners, &envelope);
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| GossipError::Transport {
            peer: peer.clone(),
            reason: format!("delayed delivery needs a tokio runtime: {e}"),
        })?;
        runtime.spawn(async move {
            tokio::time::sleep(settings.delay).await;
            deliver(&listeners, &envelope);
        });
        Ok(())
    }

    fn subscribe(&self, listener: Arc<dyn MessageListener>) {
        self.network.add_listener(&self.local, listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        qualifier: String,
        received: Mutex<Vec<Envelope>>,
    }

    impl Recorder {
        fn for_qualifier(qualifier: &str) -> Arc<Self> {
            Arc::new(Self {
                qualifier: qualifier.to_string(),
                received: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.received.lock().len()
        }
    }

    impl MessageListener for Recorder {
        fn accepts(&self, envelope: &Envelope) -> bool {
            envelope.qualifier == self.qualifier
        }

        fn on_message(&self, envelope: Envelope) {
            self.received.lock().push(envelope);
        }
    }

    fn endpoint(port: u16) -> Endpoint {
        Endpoint::new("localhost", port, format!("id{port}"))
    }

    #[test]
    fn send_delivers_and_stamps_sender() {
        let network = MemoryNetwork::new();
        let a = network.bind(endpoint(1));
        let b = network.bind(endpoint(2));
        let recorder = Recorder::for_qualifier("q");
        b.subscribe(recorder.clone());

        a.send(&endpoint(2), Envelope::qualifier_only("q")).expect("send");

        let received = recorder.received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].sender, Some(endpoint(1)));
    }

    #[test]
    fn send_skips_listeners_that_do_not_accept() {
        let network = MemoryNetwork::new();
        let a = network.bind(endpoint(1));
        let b = network.bind(endpoint(2));
        let recorder = Recorder::for_qualifier("mine");
        b.subscribe(recorder.clone());

        a.send(&endpoint(2), Envelope::qualifier_only("theirs")).expect("send");
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn send_to_unbound_endpoint_fails() {
        let network = MemoryNetwork::new();
        let a = network.bind(endpoint(1));
        let result = a.send(&endpoint(9), Envelope::qualifier_only("q"));
        assert!(matches!(result, Err(GossipError::Transport { .. })));
    }

    #[test]
    fn send_over_blocked_link_fails() {
        let network = MemoryNetwork::new();
        let a = network.bind(endpoint(1));
        let _b = network.bind(endpoint(2));
        network.emulator().put(endpoint(2), LinkSettings::blocked());

        let result = a.send(&endpoint(2), Envelope::qualifier_only("q"));
        assert!(matches!(result, Err(GossipError::Transport { peer, .. }) if peer == endpoint(2)));
    }

    #[test]
    fn send_over_fully_lossy_link_is_accepted_but_dropped() {
        let network = MemoryNetwork::new();
        let a = network.bind(endpoint(1));
        let b = network.bind(endpoint(2));
        let recorder = Recorder::for_qualifier("q");
        b.subscribe(recorder.clone());
        network.emulator().put(endpoint(2), LinkSettings::lossy(100));

        a.send(&endpoint(2), Envelope::qualifier_only("q")).expect("send accepted");
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn delayed_send_without_runtime_fails() {
        let network = MemoryNetwork::new();
        let a = network.bind(endpoint(1));
        let _b = network.bind(endpoint(2));
        network
            .emulator()
            .put(endpoint(2), LinkSettings::delayed(Duration::from_millis(10)));

        let result = a.send(&endpoint(2), Envelope::qualifier_only("q"));
        assert!(matches!(result, Err(GossipError::Transport { .. })));
    }

    #[tokio::test]
    async fn delayed_send_arrives_later() {
        let network = MemoryNetwork::new();
        let a = network.bind(endpoint(1));
        let b = network.bind(endpoint(2));
        let recorder = Recorder::for_qualifier("q");
        b.subscribe(recorder.clone());
        network
            .emulator()
            .put(endpoint(2), LinkSettings::delayed(Duration::from_millis(20)));

        a.send(&endpoint(2), Envelope::qualifier_only("q")).expect("send");
        assert_eq!(recorder.count(), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn network_membership_lists_bound_endpoints() {
        let network = MemoryNetwork::new();
        let _a = network.bind(endpoint(1));
        let _b = network.bind(endpoint(2));
        assert_eq!(network.node_count(), 2);

        network.unbind(&endpoint(1));
        assert_eq!(network.current_peers(), vec![endpoint(2)]);
    }
}
