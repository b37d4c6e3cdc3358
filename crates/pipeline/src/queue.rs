//! Bounded FIFO between batch ingestion and the transport

use std::collections::VecDeque;

use detective_common::WireRecord;

/// Fixed-capacity record queue with offer/poll semantics.
///
/// Nothing here ever waits: a full queue rejects the newest record.
#[derive(Debug)]
pub struct DeliveryQueue {
    records: VecDeque<WireRecord>,
    capacity: usize,
}

impl DeliveryQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the tail. Returns `false` (and drops `record`) when full.
    #[inline]
    pub fn offer(&mut self, record: WireRecord) -> bool {
        if self.records.len() >= self.capacity {
            return false;
        }
        self.records.push_back(record);
        true
    }

    /// Replace the contents with `records`, keeping at most `capacity` of
    /// them in order. Returns how many were dropped.
    pub fn reset_and_fill<I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = WireRecord>,
    {
        self.records.clear();
        let mut dropped = 0;
        for record in records {
            if !self.offer(record) {
                dropped += 1;
            }
        }
        dropped
    }

    /// Remove and return the oldest record.
    #[inline]
    pub fn take_next(&mut self) -> Option<WireRecord> {
        self.records.pop_front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use detective_common::NetworkRecord;

    fn network(i: u8) -> WireRecord {
        WireRecord::Network(NetworkRecord {
            is_encrypted: false,
            signal_quality: i,
            ssid: format!("net{}", i),
            bssid: String::new(),
            should_alert: false,
        })
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = DeliveryQueue::new(16);
        let dropped = queue.reset_and_fill((0..5).map(network));
        assert_eq!(dropped, 0);

        for i in 0..5 {
            assert_eq!(queue.take_next(), Some(network(i)));
        }
        assert_eq!(queue.take_next(), None);
    }

    #[test]
    fn test_overflow_drops_newest() {
        let mut queue = DeliveryQueue::new(16);
        let dropped = queue.reset_and_fill((0..20).map(network));

        assert_eq!(dropped, 4);
        assert_eq!(queue.len(), 16);
        assert_eq!(queue.take_next(), Some(network(0)));
        let last = std::iter::from_fn(|| queue.take_next()).last();
        assert_eq!(last, Some(network(15)));
    }

    #[test]
    fn test_reset_discards_stale_batch() {
        let mut queue = DeliveryQueue::new(4);
        queue.reset_and_fill((0..3).map(network));
        queue.take_next();

        queue.reset_and_fill(vec![WireRecord::Cleanup]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.take_next(), Some(WireRecord::Cleanup));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_offer_when_full() {
        let mut queue = DeliveryQueue::new(1);
        assert!(queue.offer(WireRecord::Cleanup));
        assert!(!queue.offer(network(1)));
        assert_eq!(queue.capacity(), 1);
    }
}
