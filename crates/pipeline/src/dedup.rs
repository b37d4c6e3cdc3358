//! Process-lifetime memory of public networks already alerted on

use std::collections::HashSet;

/// Identifiers (SSIDs) that have already triggered an alert.
///
/// Grows for the lifetime of the pipeline and is never persisted, so a
/// restart alerts on every open network again.
#[derive(Debug, Default)]
pub struct DedupTracker {
    seen: HashSet<String>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact, case-sensitive membership check.
    #[inline]
    pub fn seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    #[inline]
    pub fn mark_seen(&mut self, id: &str) {
        if !self.seen.contains(id) {
            self.seen.insert(id.to_owned());
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_check() {
        let mut dedup = DedupTracker::new();
        assert!(!dedup.seen("Open"));
        dedup.mark_seen("Open");
        assert!(dedup.seen("Open"));
        dedup.mark_seen("Open");
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_case_sensitive() {
        let mut dedup = DedupTracker::new();
        dedup.mark_seen("Open");
        assert!(!dedup.seen("open"));
        assert!(!dedup.seen("Open "));
    }
}
