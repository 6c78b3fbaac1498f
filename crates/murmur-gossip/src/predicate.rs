//! Send and expiry decisions over [`RumorRecord`]s.

use crate::endpoint::Endpoint;
use crate::store::RumorRecord;

/// Decides whether a rumor should be pushed to one target peer.
///
/// A record is eligible when the target does not already hold it and the
/// record has been sent fewer than `max_sends` times. The second condition
/// caps amplification per rumor per node regardless of cluster size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendEligibility {
    target: Endpoint,
    max_sends: u32,
}

impl SendEligibility {
    /// Creates a predicate for `target`.
    #[must_use]
    pub const fn new(target: Endpoint, max_sends: u32) -> Self {
        Self { target, max_sends }
    }

    /// Returns the peer this predicate evaluates for.
    #[must_use]
    pub const fn target(&self) -> &Endpoint {
        &self.target
    }

    /// Returns the repeat bound.
    #[must_use]
    pub const fn max_sends(&self) -> u32 {
        self.max_sends
    }

    /// Returns true if the record should be sent to the target now.
    #[must_use]
    pub fn eligible(&self, record: &RumorRecord) -> bool {
        !record.is_notified(&self.target) && record.sent_count() < self.max_sends
    }
}

/// Decides whether a record has outlived its retention window.
///
/// A record expires once its age reaches `retention_window - margin`; the
/// cutoff is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPredicate {
    retention_window: u64,
    margin: u64,
}

impl ExpiryPredicate {
    /// Creates a predicate. A margin wider than the window yields a zero cutoff.
    #[must_use]
    pub const fn new(retention_window: u64, margin: u64) -> Self {
        Self {
            retention_window,
            margin,
        }
    }

    /// Age in ticks at which a record expires.
    #[must_use]
    pub const fn cutoff(&self) -> u64 {
        self.retention_window.saturating_sub(self.margin)
    }

    /// Returns true if the record should be purged at logical time `now`.
    #[must_use]
    pub fn expired(&self, record: &RumorRecord, now: u64) -> bool {
        now.saturating_sub(record.created_at()) >= self.cutoff()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Envelope, Rumor};
    use crate::store::RumorStore;
    use test_case::test_case;

    fn remote() -> Endpoint {
        Endpoint::new("localhost", 1, "id1")
    }

    fn local() -> Endpoint {
        Endpoint::new("localhost", 2, "id2")
    }

    fn rumor(id: &str) -> Rumor {
        Rumor::new(id, Envelope::new("test", serde_json::json!({})))
    }

    // ========== SendEligibility Tests ==========

    #[test]
    fn fresh_record_is_eligible() {
        let predicate = SendEligibility::new(remote(), 3);
        let record = RumorRecord::new(rumor("1"), None, 0);
        assert!(predicate.eligible(&record));
    }

    #[test]
    fn send_predicate_composite_scenario() {
        let predicate = SendEligibility::new(remote(), 3);
        let mut store = RumorStore::new();

        store.insert(rumor("1"), Some(local()), 0);
        assert!(predicate.eligible(store.get("1").expect("record")));

        store.record_sent("1", &remote());
        assert!(!predicate.eligible(store.get("1").expect("record")));

        store.insert(rumor("2"), Some(local()), 0);
        for port in 10..13 {
            store.record_sent("2", &Endpoint::new("other", port, "x"));
        }
        let exhausted = store.get("2").expect("record");
        assert_eq!(exhausted.sent_count(), 3);
        assert!(!exhausted.is_notified(&remote()));
        assert!(!predicate.eligible(exhausted));
    }

    #[test]
    fn exhausted_record_ineligible_with_no_notified_peers() {
        let record = RumorRecord::new(rumor("1"), None, 0).with_sent_count(3);
        assert!(record.notified_peers().is_empty());

        let predicate = SendEligibility::new(remote(), 3);
        assert!(!predicate.eligible(&record));
    }

    #[test]
    fn originator_is_never_eligible() {
        let predicate = SendEligibility::new(local(), 3);
        let record = RumorRecord::new(rumor("1"), Some(local()), 0);
        assert!(!predicate.eligible(&record));
    }

    // ========== ExpiryPredicate Tests ==========

    #[test_case(50, false ; "well inside window")]
    #[test_case(89, false ; "one before cutoff")]
    #[test_case(90, true ; "exactly at cutoff")]
    #[test_case(95, true ; "inside margin")]
    #[test_case(500, true ; "far past window")]
    fn expiry_cutoff(age: u64, expected: bool) {
        let predicate = ExpiryPredicate::new(100, 10);
        let record = RumorRecord::new(rumor("1"), Some(local()), 0);
        assert_eq!(predicate.expired(&record, age), expected);
    }

    #[test]
    fn expiry_uses_age_not_absolute_time() {
        let predicate = ExpiryPredicate::new(100, 10);
        let record = RumorRecord::new(rumor("1"), None, 1_000);
        assert!(!predicate.expired(&record, 1_050));
        assert!(predicate.expired(&record, 1_090));
    }

    #[test]
    fn expiry_clock_behind_record_is_not_expired() {
        let predicate = ExpiryPredicate::new(100, 10);
        let record = RumorRecord::new(rumor("1"), None, 10);
        assert!(!predicate.expired(&record, 0));
    }

    #[test]
    fn expiry_cutoff_saturates() {
        assert_eq!(ExpiryPredicate::new(100, 10).cutoff(), 90);
        assert_eq!(ExpiryPredicate::new(5, 10).cutoff(), 0);
    }
}
