//! Per-link network condition overrides for the in-memory transport.

use crate::endpoint::Endpoint;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Conditions applied to envelopes addressed to one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkSettings {
    /// Percentage (0-100) of accepted envelopes silently dropped.
    pub loss_percent: u8,
    /// Delay before delivery.
    pub delay: Duration,
    /// Refuse sends outright, surfacing a transport error to the sender.
    pub blocked: bool,
}

impl LinkSettings {
    /// A link that drops `percent` of envelopes.
    #[must_use]
    pub fn lossy(percent: u8) -> Self {
        Self {
            loss_percent: percent.min(100),
            ..Self::default()
        }
    }

    /// A link that delays every envelope.
    #[must_use]
    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// A link that refuses every send.
    #[must_use]
    pub fn blocked() -> Self {
        Self {
            blocked: true,
            ..Self::default()
        }
    }

    /// Returns true if the link behaves like a perfect network.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Keyed table of [`LinkSettings`] by destination endpoint.
///
/// Clones share the same table; inject one into each network that needs it.
#[derive(Debug, Clone, Default)]
pub struct NetworkEmulator {
    links: Arc<RwLock<HashMap<Endpoint, LinkSettings>>>,
}

impl NetworkEmulator {
    /// Creates an emulator with no overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the settings for `endpoint`, or a clean link if none were set.
    #[must_use]
    pub fn get(&self, endpoint: &Endpoint) -> LinkSettings {
        self.links.read().get(endpoint).copied().unwrap_or_default()
    }

    /// Sets the settings for `endpoint`.
    pub fn put(&self, endpoint: Endpoint, settings: LinkSettings) {
        self.links.write().insert(endpoint, settings);
    }

    /// Clears the override for `endpoint`.
    pub fn remove(&self, endpoint: &Endpoint) -> Option<LinkSettings> {
        self.links.write().remove(endpoint)
    }

    /// Clears every override.
    pub fn clear(&self) {
        self.links.write().clear();
    }

    /// Number of endpoints with overrides.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.read().len()
    }

    /// Returns true if no overrides are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.read().is_empty()
    }
}
