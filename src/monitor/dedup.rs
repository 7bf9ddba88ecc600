use std::collections::{HashSet, VecDeque};
use tracing::debug;

pub const DEFAULT_DEDUP_CAPACITY: usize = 1_000;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DedupStats {
    pub checked: u64,
    pub skipped: u64,
    pub evicted: u64,
}

/// Bounded record of signatures that are being fetched or already were.
///
/// A signature is marked in-flight before its fetch starts. It moves to the
/// seen set only once resolved, so a signature that was never visible can be
/// retried by a later notification. The seen set evicts in insertion order.
#[derive(Debug)]
pub struct DedupCache {
    capacity: usize,
    seen: HashSet<String>,
    seen_order: VecDeque<String>,
    in_flight: HashSet<String>,
    stats: DedupStats,
}

impl DedupCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            seen: HashSet::with_capacity(capacity + 1),
            seen_order: VecDeque::with_capacity(capacity + 1),
            in_flight: HashSet::new(),
            stats: DedupStats::default(),
        }
    }

    /// Returns true (and marks the signature in-flight) if it should be fetched
    pub fn should_process(&mut self, signature: &str) -> bool {
        self.stats.checked += 1;

        if self.seen.contains(signature) || self.in_flight.contains(signature) {
            self.stats.skipped += 1;
            debug!("Skipping duplicate transaction: {}", signature);
            return false;
        }

        self.in_flight.insert(signature.to_string());
        true
    }

    /// Release the in-flight mark, remembering the signature if it resolved
    pub fn complete(&mut self, signature: &str, resolved: bool) {
        self.in_flight.remove(signature);
        if resolved {
            self.mark_seen(signature);
        }
    }

    pub fn mark_seen(&mut self, signature: &str) {
        if !self.seen.insert(signature.to_string()) {
            return;
        }
        self.seen_order.push_back(signature.to_string());

        while self.seen.len() > self.capacity {
            let Some(oldest) = self.seen_order.pop_front() else {
                break;
            };
            self.seen.remove(&oldest);
            self.stats.evicted += 1;
        }
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.seen.contains(signature)
    }

    pub fn is_in_flight(&self, signature: &str) -> bool {
        self.in_flight.contains(signature)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn stats(&self) -> DedupStats {
        self.stats
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}
