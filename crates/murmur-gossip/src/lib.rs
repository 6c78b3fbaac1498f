//! # murmur-gossip
//!
//! Bounded-fanout epidemic dissemination for a cluster of peers.
//!
//! Each node keeps a table of rumors it has seen. On every tick it drains
//! newly arrived rumors into that table, picks a few random peers, sends
//! each of them one batch of the rumors it has not yet told them about, and
//! evicts rumors that have outlived the retention window.
//!
//! This crate provides:
//!
//! - A per-node [`RumorStore`] with send accounting and expiry
//! - Pure [`SendEligibility`] and [`ExpiryPredicate`] decisions
//! - An inbound path ([`GossipListener`]) that unpacks batches onto an [`IngestQueue`]
//! - The tick-driven [`DisseminationEngine`] and its async host [`GossipService`]
//! - An in-process [`MemoryNetwork`] with per-link loss, delay and partition emulation
//!
//! ## Core Types
//!
//! - [`Endpoint`]: Identity of a peer (`host:port:id`)
//! - [`Rumor`]: A unique id plus an opaque [`Envelope`] payload
//! - [`RumorRecord`]: A node's bookkeeping for one rumor
//! - [`GossipConfig`]: Tick period, fanout, send cap and retention
//!
//! Collaborators are injected through the [`Transport`] and [`Membership`] traits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod inbound;
pub mod message;
pub mod predicate;
pub mod queue;
pub mod service;
pub mod store;
pub mod transport;

pub use config::GossipConfig;
pub use endpoint::Endpoint;
pub use engine::{DisseminationEngine, EngineStats, GossipEvent, TickReport};
pub use error::GossipError;
pub use inbound::{GossipListener, InboundRequestHandler, MessageClassifier};
pub use message::{Envelope, GossipBatch, Rumor, GOSSIP_BATCH_QUALIFIER};
pub use predicate::{ExpiryPredicate, SendEligibility};
pub use queue::{IngestItem, IngestQueue};
pub use service::{GossipHandle, GossipService};
pub use store::{RumorRecord, RumorStore};
pub use transport::{
    LinkSettings, Membership, MemoryNetwork, MemoryTransport, MessageListener, NetworkEmulator,
    StaticMembership, Transport,
};
