//! Error types for murmur-gossip.

use thiserror::Error;

use crate::endpoint::Endpoint;

/// Errors that can occur while disseminating rumors.
#[derive(Debug, Error)]
pub enum GossipError {
    /// Configuration was rejected at start time.
    #[error("invalid gossip config: {0}")]
    Config(String),

    /// An inbound gossip batch could not be decoded.
    #[error("malformed gossip batch: {0}")]
    Decode(String),

    /// An outbound batch could not be serialized.
    #[error("failed to encode gossip batch: {0}")]
    Encode(String),

    /// The transport refused an outbound envelope.
    #[error("send to {peer} failed: {reason}")]
    Transport {
        /// The peer the envelope was addressed to.
        peer: Endpoint,
        /// Human-readable reason for the failure.
        reason: String,
    },

    /// An endpoint string did not match `host:port:id`.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The dissemination loop is not running.
    #[error("gossip service is not running")]
    NotRunning,
}

impl From<serde_json::Error> for GossipError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
