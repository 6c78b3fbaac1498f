//! Multi-producer FIFO feeding the dissemination loop.

use crate::endpoint::Endpoint;
use crate::message::Rumor;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// One unit of ingestion work: a rumor and the peer that reported it.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestItem {
    /// The rumor to ingest.
    pub rumor: Rumor,
    /// Reporting peer, or `None` for a self-originated rumor.
    pub originator: Option<Endpoint>,
}

impl IngestItem {
    /// Work item for a rumor originated on this node.
    #[must_use]
    pub const fn local(rumor: Rumor) -> Self {
        Self {
            rumor,
            originator: None,
        }
    }

    /// Work item for a rumor received from `peer`.
    #[must_use]
    pub const fn from_peer(rumor: Rumor, peer: Endpoint) -> Self {
        Self {
            rumor,
            originator: Some(peer),
        }
    }
}

/// Shared ingestion queue. Clones refer to the same buffer.
///
/// Producers push from any thread; the dissemination loop drains once per tick.
#[derive(Debug, Clone, Default)]
pub struct IngestQueue {
    items: Arc<Mutex<VecDeque<IngestItem>>>,
}

impl IngestQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one item.
    pub fn push(&self, item: IngestItem) {
        self.items.lock().push_back(item);
    }

    /// Appends all items atomically, preserving their order.
    pub fn push_all(&self, items: impl IntoIterator<Item = IngestItem>) {
        self.items.lock().extend(items);
    }

    /// Removes and returns everything queued so far, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<IngestItem> {
        self.items.lock().drain(..).collect()
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Envelope;

    fn rumor(id: &str) -> Rumor {
        Rumor::new(id, Envelope::qualifier_only("123"))
    }

    #[test]
    fn queue_is_fifo() {
        let queue = IngestQueue::new();
        queue.push(IngestItem::local(rumor("a")));
        queue.push_all(vec![IngestItem::local(rumor("b")), IngestItem::local(rumor("c"))]);

        let ids: Vec<_> = queue.drain().into_iter().map(|i| i.rumor.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn queue_clones_share_buffer() {
        let queue = IngestQueue::new();
        let producer = queue.clone();
        producer.push(IngestItem::local(rumor("a")));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn queue_accepts_concurrent_producers() {
        let queue = IngestQueue::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let producer = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        producer.push(IngestItem::local(rumor(&format!("{t}-{i}"))));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("producer thread");
        }
        assert_eq!(queue.drain().len(), 400);
    }
}
