use crate::timetable::block::TimeBlock;
use crate::timetable::error::TimetableResult;
use crate::timetable::layout::{layout_week, LayoutOptions, WeekLayout};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

pub const DEFAULT_CAPACITY: usize = 32;

/// SHA-256 over the canonical JSON of the ordered block set and the options.
///
/// Input order is part of the key because equal-start ties fall back to it.
pub fn content_key(blocks: &[TimeBlock], options: &LayoutOptions) -> Option<String> {
    let mut hasher = Sha256::new();
    serde_json::to_writer(&mut hasher, &(blocks, options)).ok()?;
    Some(format!("{:x}", hasher.finalize()))
}

/// Bounded memo of computed week layouts. Stored layouts are never mutated; a
/// changed block set simply hashes to a different key.
#[derive(Debug)]
pub struct LayoutCache {
    capacity: usize,
    entries: HashMap<String, Arc<WeekLayout>>,
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl LayoutCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Returns the memoized layout and whether it was a hit.
    pub fn get_or_compute(
        &mut self,
        blocks: &[TimeBlock],
        options: &LayoutOptions,
    ) -> TimetableResult<(Arc<WeekLayout>, bool)> {
        let Some(key) = content_key(blocks, options) else {
            self.misses += 1;
            return Ok((Arc::new(layout_week(blocks, options)?), false));
        };
        if let Some(hit) = self.entries.get(&key) {
            self.hits += 1;
            tracing::debug!(key = %key, "layout cache hit");
            return Ok((Arc::clone(hit), true));
        }

        self.misses += 1;
        let layout = Arc::new(layout_week(blocks, options)?);
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        tracing::debug!(key = %key, size = self.entries.len() + 1, "layout cache store");
        self.order.push_back(key.clone());
        self.entries.insert(key, Arc::clone(&layout));
        Ok((layout, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::block::DayOfWeek;
    use crate::timetable::cluster::tests::block;

    #[test]
    fn identical_input_hits_and_shares_the_layout() {
        let blocks = vec![block("a", DayOfWeek::Monday, 540, 600)];
        let opts = LayoutOptions::default();
        let mut cache = LayoutCache::default();
        let (first, hit1) = cache.get_or_compute(&blocks, &opts).expect("layout");
        let (second, hit2) = cache.get_or_compute(&blocks, &opts).expect("layout");
        assert!(!hit1);
        assert!(hit2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn changed_content_or_options_misses() {
        let mut blocks = vec![block("a", DayOfWeek::Monday, 540, 600)];
        let mut opts = LayoutOptions::default();
        let base = content_key(&blocks, &opts).expect("key");

        opts.pixels_per_minute = 2.0;
        assert_ne!(content_key(&blocks, &opts).expect("key"), base);

        opts = LayoutOptions::default();
        blocks[0].end = 610;
        assert_ne!(content_key(&blocks, &opts).expect("key"), base);

        blocks[0].end = 600;
        assert_eq!(content_key(&blocks, &opts).expect("key"), base);
    }

    #[test]
    fn oldest_entry_is_evicted_at_capacity() {
        let opts = LayoutOptions::default();
        let mut cache = LayoutCache::with_capacity(2);
        for end in [600, 610, 620] {
            let blocks = vec![block("a", DayOfWeek::Monday, 540, end)];
            cache.get_or_compute(&blocks, &opts).expect("layout");
        }
        assert_eq!(cache.len(), 2);
        let (_, hit) = cache
            .get_or_compute(&[block("a", DayOfWeek::Monday, 540, 600)], &opts)
            .expect("layout");
        assert!(!hit);
    }

    #[test]
    fn invalid_options_are_not_cached() {
        let mut opts = LayoutOptions::default();
        opts.slot_minutes = 0;
        let mut cache = LayoutCache::default();
        let e = cache.get_or_compute(&[], &opts).expect_err("invalid");
        assert_eq!(e.code(), "invalid_slot_interval");
        assert!(cache.is_empty());
    }
}
