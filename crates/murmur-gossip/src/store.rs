//! Per-rumor propagation bookkeeping.

use crate::endpoint::Endpoint;
use crate::message::Rumor;
use crate::predicate::ExpiryPredicate;
use std::collections::{HashMap, HashSet};

/// Local propagation state of one rumor.
///
/// Only the owning [`RumorStore`] mutates a record, through
/// [`RumorStore::record_sent`].
#[derive(Debug, Clone, PartialEq)]
pub struct RumorRecord {
    rumor: Rumor,
    /// Peer that reported this rumor to us; `None` if it originated here.
    originator: Option<Endpoint>,
    /// Logical time at insertion.
    created_at: u64,
    /// Successful sends to new peers.
    sent_count: u32,
    /// Peers already holding the rumor, including the originator.
    notified_peers: HashSet<Endpoint>,
}

impl RumorRecord {
    /// Creates a fresh record. The originator, if any, is treated as already notified.
    #[must_use]
    pub fn new(rumor: Rumor, originator: Option<Endpoint>, now: u64) -> Self {
        let notified_peers = originator.iter().cloned().collect();
        Self {
            rumor,
            originator,
            created_at: now,
            sent_count: 0,
            notified_peers,
        }
    }

    /// Returns the rumor being spread.
    #[must_use]
    pub const fn rumor(&self) -> &Rumor {
        &self.rumor
    }

    /// Returns the rumor id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.rumor.id()
    }

    /// Returns the peer that reported the rumor, if any.
    #[must_use]
    pub const fn originator(&self) -> Option<&Endpoint> {
        self.originator.as_ref()
    }

    /// Returns the logical time the record was created.
    #[must_use]
    pub const fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Returns the number of successful sends.
    #[must_use]
    pub const fn sent_count(&self) -> u32 {
        self.sent_count
    }

    /// Returns the peers known to hold this rumor.
    #[must_use]
    pub const fn notified_peers(&self) -> &HashSet<Endpoint> {
        &self.notified_peers
    }

    /// Returns true if `peer` already holds this rumor.
    #[must_use]
    pub fn is_notified(&self, peer: &Endpoint) -> bool {
        self.notified_peers.contains(peer)
    }

    /// Projects the record back into the rumor to put on the wire.
    ///
    /// Pure; pair with [`RumorStore::record_sent`] once the send is accepted.
    #[must_use]
    pub fn to_rumor(&self) -> Rumor {
        self.rumor.clone()
    }

    #[cfg(test)]
    pub(crate) const fn with_sent_count(mut self, sent_count: u32) -> Self {
        self.sent_count = sent_count;
        self
    }

    /// Records a send to `peer`. Returns false if the peer was already notified.
    pub(crate) fn mark_sent(&mut self, peer: Endpoint) -> bool {
        if !self.notified_peers.insert(peer) {
            return false;
        }
        self.sent_count = self.sent_count.saturating_add(1);
        true
    }
}

/// Owns every live [`RumorRecord`] on this node, keyed by rumor id.
#[derive(Debug, Default)]
pub struct RumorStore {
    records: HashMap<String, RumorRecord>,
}

impl RumorStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a rumor unless one with the same id is already present.
    ///
    /// Returns false, leaving the existing record untouched, on a duplicate id.
    pub fn insert(&mut self, rumor: Rumor, originator: Option<Endpoint>, now: u64) -> bool {
        if self.records.contains_key(rumor.id()) {
            return false;
        }
        let id = rumor.id().to_string();
        self.records
            .insert(id, RumorRecord::new(rumor, originator, now));
        true
    }

    /// Looks up a record by rumor id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RumorRecord> {
        self.records.get(id)
    }

    /// Returns true if a record with this id is live.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no records are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of every live record, each exactly once, in unspecified order.
    #[must_use]
    pub fn all(&self) -> Vec<&RumorRecord> {
        self.records.values().collect()
    }

    /// Records a successful send of rumor `id` to `peer`.
    ///
    /// Returns false if the record no longer exists or `peer` already had it.
    pub fn record_sent(&mut self, id: &str, peer: &Endpoint) -> bool {
        self.records
            .get_mut(id)
            .is_some_and(|record| record.mark_sent(peer.clone()))
    }

    /// Removes a record.
    pub fn remove(&mut self, id: &str) -> Option<RumorRecord> {
        self.records.remove(id)
    }

    /// Removes every record the predicate reports as expired at `now`.
    ///
    /// Returns the ids removed.
    pub fn sweep(&mut self, predicate: &ExpiryPredicate, now: u64) -> Vec<String> {
        let expired: Vec<String> = self
            .records
            .values()
            .filter(|record| predicate.expired(record, now))
            .map(|record| record.id().to_string())
            .collect();

        for id in &expired {
            self.records.remove(id);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Envelope;

    fn rumor(id: &str) -> Rumor {
        Rumor::new(id, Envelope::qualifier_only("123"))
    }

    fn remote() -> Endpoint {
        Endpoint::new("localhost", 1, "id1")
    }

    fn local() -> Endpoint {
        Endpoint::new("localhost", 2, "id2")
    }

    // ========== RumorRecord Tests ==========

    #[test]
    fn record_new_self_originated() {
        let record = RumorRecord::new(rumor("1"), None, 7);
        assert_eq!(record.id(), "1");
        assert_eq!(record.created_at(), 7);
        assert_eq!(record.sent_count(), 0);
        assert!(record.originator().is_none());
        assert!(record.notified_peers().is_empty());
    }

    #[test]
    fn record_new_from_peer_marks_originator_notified() {
        let record = RumorRecord::new(rumor("1"), Some(remote()), 0);
        assert_eq!(record.originator(), Some(&remote()));
        assert!(record.is_notified(&remote()));
        assert_eq!(record.sent_count(), 0);
    }

    #[test]
    fn record_to_rumor_is_pure() {
        let original = rumor("1");
        let record = RumorRecord::new(original.clone(), None, 0);

        assert_eq!(record.to_rumor(), original);
        assert_eq!(record.to_rumor(), original);
        assert_eq!(record.sent_count(), 0);
    }

    #[test]
    fn record_mark_sent_counts_new_peers_only() {
        let mut record = RumorRecord::new(rumor("1"), Some(local()), 0);

        assert!(record.mark_sent(remote()));
        assert_eq!(record.sent_count(), 1);

        assert!(!record.mark_sent(remote()));
        assert_eq!(record.sent_count(), 1);

        // The originator is already aware and never counts as a send.
        assert!(!record.mark_sent(local()));
        assert_eq!(record.sent_count(), 1);
        assert_eq!(record.notified_peers().len(), 2);
    }

    // ========== RumorStore Tests ==========

    #[test]
    fn store_insert_new() {
        let mut store = RumorStore::new();
        assert!(store.insert(rumor("1"), None, 3));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("1").map(RumorRecord::created_at), Some(3));
    }

    #[test]
    fn store_insert_duplicate_is_noop() {
        let mut store = RumorStore::new();
        assert!(store.insert(rumor("1"), Some(remote()), 0));
        store.record_sent("1", &local());

        assert!(!store.insert(rumor("1"), None, 10));
        assert_eq!(store.len(), 1);

        let record = store.get("1").expect("record");
        assert_eq!(record.created_at(), 0);
        assert_eq!(record.sent_count(), 1);
        assert_eq!(record.originator(), Some(&remote()));
    }

    #[test]
    fn store_all_returns_every_record_once() {
        let mut store = RumorStore::new();
        for i in 0..10 {
            store.insert(rumor(&i.to_string()), None, 0);
        }

        let mut ids: Vec<_> = store.all().iter().map(|r| r.id().to_string()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn store_record_sent_missing_record() {
        let mut store = RumorStore::new();
        assert!(!store.record_sent("nope", &remote()));
    }

    #[test]
    fn store_record_sent_after_remove_is_noop() {
        let mut store = RumorStore::new();
        store.insert(rumor("1"), None, 0);
        let removed = store.remove("1").expect("removed");
        assert_eq!(removed.sent_count(), 0);

        assert!(!store.record_sent("1", &remote()));
        assert!(store.remove("1").is_none());
    }

    #[test]
    fn store_sweep_removes_expired_only() {
        let mut store = RumorStore::new();
        store.insert(rumor("old"), None, 0);
        store.insert(rumor("young"), None, 50);

        let predicate = ExpiryPredicate::new(100, 10);
        let removed = store.sweep(&predicate, 90);

        assert_eq!(removed, vec!["old".to_string()]);
        assert!(!store.contains("old"));
        assert!(store.contains("young"));
    }

    #[test]
    fn store_sweep_is_idempotent() {
        let mut store = RumorStore::new();
        store.insert(rumor("a"), None, 0);
        store.insert(rumor("b"), None, 1);
        store.insert(rumor("c"), None, 80);

        let predicate = ExpiryPredicate::new(100, 10);
        let mut first = store.sweep(&predicate, 91);
        first.sort();
        assert_eq!(first, vec!["a".to_string(), "b".to_string()]);

        let second = store.sweep(&predicate, 91);
        assert!(second.is_empty());
        assert_eq!(store.len(), 1);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn store_dedups_by_id(ids in proptest::collection::vec(0u8..16, 0..64)) {
                let mut store = RumorStore::new();
                let mut distinct = std::collections::HashSet::new();

                for id in &ids {
                    let inserted = store.insert(rumor(&id.to_string()), None, 0);
                    prop_assert_eq!(inserted, distinct.insert(*id));
                }

                prop_assert_eq!(store.len(), distinct.len());
            }

            #[test]
            fn sent_count_matches_notified_excluding_originator(
                ports in proptest::collection::vec(1u16..32, 0..64),
            ) {
                let originator = Endpoint::new("origin", 0, "o");
                let mut store = RumorStore::new();
                store.insert(rumor("1"), Some(originator.clone()), 0);

                for port in ports {
                    store.record_sent("1", &Endpoint::new("peer", port, "p"));
                    store.record_sent("1", &originator);
                }

                let record = store.get("1").expect("record");
                prop_assert_eq!(record.sent_count() as usize, record.notified_peers().len() - 1);
            }
        }
    }
}
