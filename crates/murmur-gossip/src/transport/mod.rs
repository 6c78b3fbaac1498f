//! Collaborator interfaces the dissemination core runs on.
//!
//! ## Architecture
//!
//! - [`Transport`]: fire-and-forget outbound sends plus inbound subscription
//! - [`MessageListener`]: inbound callback registered with a transport
//! - [`Membership`]: source of the current peer set
//! - [`MemoryNetwork`]: in-process transport hub with per-link emulation

mod emulator;
mod memory;

pub use emulator::{LinkSettings, NetworkEmulator};
pub use memory::{MemoryNetwork, MemoryTransport};

use crate::endpoint::Endpoint;
use crate::error::GossipError;
use crate::message::Envelope;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Outbound and inbound message plumbing.
///
/// Implementations own connection management, handshakes and framing; the
/// core only hands over envelopes.
pub trait Transport: Send + Sync {
    /// Returns this node's endpoint.
    fn local_endpoint(&self) -> &Endpoint;

    /// Hands an envelope to the transport for delivery to `peer`.
    ///
    /// Must not block on the remote side. `Ok` means the envelope was
    /// accepted, not that it was delivered.
    ///
    /// # Errors
    ///
    /// Returns [`GossipError::Transport`] if the envelope was refused.
    fn send(&self, peer: &Endpoint, envelope: Envelope) -> Result<(), GossipError>;

    /// Registers a listener for inbound envelopes.
    fn subscribe(&self, listener: Arc<dyn MessageListener>);
}

/// Receives inbound envelopes from a [`Transport`].
pub trait MessageListener: Send + Sync {
    /// Returns true if this listener owns the envelope.
    fn accepts(&self, envelope: &Envelope) -> bool;

    /// Called for every inbound envelope this listener accepts.
    fn on_message(&self, envelope: Envelope);
}

/// Source of the current cluster peer set.
pub trait Membership: Send + Sync {
    /// Snapshot of the peers currently known. May include the local node.
    fn current_peers(&self) -> Vec<Endpoint>;
}

/// A membership view maintained by hand.
#[derive(Debug, Clone, Default)]
pub struct StaticMembership {
    peers: Arc<RwLock<HashSet<Endpoint>>>,
}

impl StaticMembership {
    /// Creates a membership view with the given peers.
    #[must_use]
    pub fn new(peers: impl IntoIterator<Item = Endpoint>) -> Self {
        Self {
            peers: Arc::new(RwLock::new(peers.into_iter().collect())),
        }
    }

    /// Adds a peer. Returns false if it was already present.
    pub fn add(&self, peer: Endpoint) -> bool {
        self.peers.write().insert(peer)
    }

    /// Removes a peer. Returns false if it was not present.
    pub fn remove(&self, peer: &Endpoint) -> bool {
        self.peers.write().remove(peer)
    }

    /// Replaces the whole peer set.
    pub fn replace(&self, peers: impl IntoIterator<Item = Endpoint>) {
        *self.peers.write() = peers.into_iter().collect();
    }

    /// Number of peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// Returns true if there are no peers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

impl Membership for StaticMembership {
    fn current_peers(&self) -> Vec<Endpoint> {
        self.peers.read().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(port: u16) -> Endpoint {
        Endpoint::new("localhost", port, format!("id{port}"))
    }

    #[test]
    fn static_membership_add_remove() {
        let membership = StaticMembership::default();
        assert!(membership.is_empty());

        assert!(membership.add(peer(1)));
        assert!(!membership.add(peer(1)));
        assert!(membership.add(peer(2)));
        assert_eq!(membership.len(), 2);

        assert!(membership.remove(&peer(1)));
        assert!(!membership.remove(&peer(1)));
        assert_eq!(membership.current_peers(), vec![peer(2)]);
    }

    #[test]
    fn static_membership_replace() {
        let membership = StaticMembership::new([peer(1), peer(2)]);
        membership.replace([peer(3)]);
        assert_eq!(membership.current_peers(), vec![peer(3)]);
    }

    #[test]
    fn static_membership_clones_share_view() {
        let membership = StaticMembership::default();
        let view = membership.clone();
        membership.add(peer(9));
        assert_eq!(view.len(), 1);
    }
}
