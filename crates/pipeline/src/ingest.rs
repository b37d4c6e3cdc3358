//! Batch ingestion: fresh scan results -> queued records

use detective_common::{RawNetwork, WireRecord};
use tracing::debug;

use crate::dedup::DedupTracker;
use crate::encoder::encode_network;
use crate::queue::DeliveryQueue;

/// Owns the dedup state and the delivery queue for one pipeline.
#[derive(Debug)]
pub struct BatchIngestor {
    dedup: DedupTracker,
    queue: DeliveryQueue,
    last_dropped: usize,
}

impl BatchIngestor {
    pub fn new(capacity: usize) -> Self {
        Self {
            dedup: DedupTracker::new(),
            queue: DeliveryQueue::new(capacity),
            last_dropped: 0,
        }
    }

    /// Ingest a scan result and hand back the record to send right away.
    ///
    /// Returns `None` without touching any state when the pipeline is not
    /// active. Otherwise the returned record is always the Cleanup marker.
    pub fn ingest(&mut self, raw: &[RawNetwork], active: bool) -> Option<WireRecord> {
        if !active {
            return None;
        }
        self.stage(raw);
        self.queue.take_next()
    }

    /// Replace the queued batch with `Cleanup` followed by one record per
    /// raw network, in input order. Returns how many records overflowed.
    ///
    /// Every network is encoded before the queue truncates, so an open
    /// network that overflowed is still marked as alerted.
    pub fn stage(&mut self, raw: &[RawNetwork]) -> usize {
        let dedup = &mut self.dedup;
        let records: Vec<WireRecord> = std::iter::once(WireRecord::Cleanup)
            .chain(raw.iter().map(|network| encode_network(network, dedup)))
            .collect();

        let dropped = self.queue.reset_and_fill(records);
        self.last_dropped = dropped;
        if dropped > 0 {
            debug!(
                "Batch of {} networks truncated, {} records dropped",
                raw.len(),
                dropped
            );
        }
        dropped
    }

    /// Records dropped by the most recent batch.
    #[inline]
    pub fn last_dropped(&self) -> usize {
        self.last_dropped
    }

    #[inline]
    pub fn take_next(&mut self) -> Option<WireRecord> {
        self.queue.take_next()
    }

    #[inline]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn dedup(&self) -> &DedupTracker {
        &self.dedup
    }
}
