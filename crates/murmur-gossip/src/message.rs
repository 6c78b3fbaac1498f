//! Envelope and rumor types exchanged over the transport.
//!
//! The core never inspects rumor payloads; it only needs the envelope
//! qualifier for routing and the batch layout for unpacking.

use crate::endpoint::Endpoint;
use crate::error::GossipError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Qualifier carried by every envelope that holds a [`GossipBatch`].
pub const GOSSIP_BATCH_QUALIFIER: &str = "gossip-batch";

/// An opaque typed message.
///
/// `qualifier` routes the envelope between subsystems sharing one transport.
/// `sender` is filled in by the transport with the authenticated remote peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Routing tag naming the payload type.
    pub qualifier: String,
    /// The peer this envelope arrived from, if it came over the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Endpoint>,
    /// Serialized payload.
    #[serde(default)]
    pub body: serde_json::Value,
}

impl Envelope {
    /// Creates an envelope with a raw body.
    #[must_use]
    pub fn new(qualifier: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            qualifier: qualifier.into(),
            sender: None,
            body,
        }
    }

    /// Creates an envelope that carries only a qualifier.
    #[must_use]
    pub fn qualifier_only(qualifier: impl Into<String>) -> Self {
        Self::new(qualifier, serde_json::Value::Null)
    }

    /// Creates an envelope by serializing `body`.
    pub fn encode<T: Serialize>(qualifier: impl Into<String>, body: &T) -> Result<Self, GossipError> {
        let body = serde_json::to_value(body).map_err(|e| GossipError::Encode(e.to_string()))?;
        Ok(Self::new(qualifier, body))
    }

    /// Deserializes the body into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, GossipError> {
        Ok(T::deserialize(&self.body)?)
    }

    /// Sets the sender.
    #[must_use]
    pub fn with_sender(mut self, sender: Endpoint) -> Self {
        self.sender = Some(sender);
        self
    }
}

/// An immutable, identified unit of gossip.
///
/// Two rumors are equal when both id and payload are equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rumor {
    id: String,
    payload: Envelope,
}

impl Rumor {
    /// Creates a rumor.
    #[must_use]
    pub fn new(id: impl Into<String>, payload: Envelope) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    /// Returns the rumor id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the payload.
    #[must_use]
    pub const fn payload(&self) -> &Envelope {
        &self.payload
    }
}

/// A batch of rumors sent to one peer in one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GossipBatch {
    /// Rumors in send order.
    pub rumors: Vec<Rumor>,
}

impl GossipBatch {
    /// Creates a batch.
    #[must_use]
    pub const fn new(rumors: Vec<Rumor>) -> Self {
        Self { rumors }
    }

    /// Number of rumors in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rumors.len()
    }

    /// Returns true if the batch carries no rumors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rumors.is_empty()
    }

    /// Wraps the batch in a `gossip-batch` envelope.
    pub fn into_envelope(self) -> Result<Envelope, GossipError> {
        Envelope::encode(GOSSIP_BATCH_QUALIFIER, &self)
    }

    /// Decodes a batch from an envelope body.
    ///
    /// # Errors
    ///
    /// Returns [`GossipError::Decode`] if the qualifier is wrong or the body
    /// does not hold a well-formed batch.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, GossipError> {
        if envelope.qualifier != GOSSIP_BATCH_QUALIFIER {
            return Err(GossipError::Decode(format!(
                "unexpected qualifier '{}'",
                envelope.qualifier
            )));
        }
        envelope.decode()
    }
}
