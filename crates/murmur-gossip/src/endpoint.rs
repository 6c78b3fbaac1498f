//! Peer addressing.
//!
//! An [`Endpoint`] names one incarnation of a cluster member: the socket it
//! listens on plus an identifier issued at handshake time. Two endpoints are
//! the same peer only if all three parts match.

use crate::error::GossipError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `host:port:id`, with the host being the shortest prefix followed by a numeric port.
static ENDPOINT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?):(\d+):(.+)$").unwrap_or_else(|_| unreachable!()));

/// Opaque, equality-comparable identifier of a gossip peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    host: String,
    port: u16,
    id: String,
}

impl Endpoint {
    /// Creates an endpoint from its parts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            id: id.into(),
        }
    }

    /// Returns the host name.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the incarnation id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.host, self.port, self.id)
    }
}

impl FromStr for Endpoint {
    type Err = GossipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = ENDPOINT_REGEX
            .captures(s)
            .ok_or_else(|| GossipError::InvalidEndpoint(format!("expected host:port:id, got '{s}'")))?;

        let port = caps[2]
            .parse::<u16>()
            .map_err(|e| GossipError::InvalidEndpoint(format!("bad port in '{s}': {e}")))?;

        Ok(Self::new(&caps[1], port, &caps[3]))
    }
}

impl TryFrom<String> for Endpoint {
    type Error = GossipError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}
