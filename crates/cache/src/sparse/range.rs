//! Interval bookkeeping for the sparse cache
//!
//! A [`RangeList`] tiles `[0, size)` with [`ByteRange`]s sorted by start,
//! with no gaps and no overlaps. Ranges are values: marking bytes as cached
//! replaces the ranges it touches with freshly built ones.

use std::fmt;

/// A contiguous extent of the source and whether the local file mirrors it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub length: u64,
    pub cached: bool,
}

impl ByteRange {
    pub const fn new(start: u64, length: u64, cached: bool) -> Self {
        Self {
            start,
            length,
            cached,
        }
    }

    /// One past the last byte
    pub const fn end(&self) -> u64 {
        self.start + self.length
    }

    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The part of `self` inside `[start, end)`, keeping the tag
    pub fn clip(&self, start: u64, end: u64) -> Option<ByteRange> {
        let lo = self.start.max(start);
        let hi = self.end().min(end);
        (lo < hi).then(|| ByteRange::new(lo, hi - lo, self.cached))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = if self.cached { "cached" } else { "uncached" };
        write!(f, "[{}, {}) {tag}", self.start, self.end())
    }
}

/// Ordered, gap-free tiling of `[0, size)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeList {
    size: u64,
    ranges: Vec<ByteRange>,
}

impl RangeList {
    /// Everything uncached
    pub fn new(size: u64) -> Self {
        let ranges = if size == 0 {
            Vec::new()
        } else {
            vec![ByteRange::new(0, size, false)]
        };
        Self { size, ranges }
    }

    /// Build from adjacent ranges, merging equal neighbours
    pub fn from_ranges(size: u64, ranges: impl IntoIterator<Item = ByteRange>) -> Self {
        let mut list = Self {
            size,
            ranges: ranges.into_iter().filter(|r| !r.is_empty()).collect(),
        };
        list.coalesce();
        list
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn cached_bytes(&self) -> u64 {
        self.ranges
            .iter()
            .filter(|r| r.cached)
            .map(|r| r.length)
            .sum()
    }

    /// Index of the first range ending after `offset`
    fn first_overlapping(&self, offset: u64) -> usize {
        self.ranges.partition_point(|r| r.end() <= offset)
    }

    /// Pieces of `[start, start + length)` in order, each wholly cached or
    /// wholly uncached. The target is clipped to `size`.
    pub fn plan(&self, start: u64, length: u64) -> Vec<ByteRange> {
        let end = start.saturating_add(length).min(self.size);
        if start >= end {
            return Vec::new();
        }

        self.ranges[self.first_overlapping(start)..]
            .iter()
            .take_while(|r| r.start < end)
            .filter_map(|r| r.clip(start, end))
            .collect()
    }

    /// Tag `[start, start + length)` as cached.
    ///
    /// Each range the target touches is replaced by up to three ranges: the
    /// part before the target, the overlap (now cached) and the part after.
    pub fn mark_cached(&mut self, start: u64, length: u64) {
        let end = start.saturating_add(length).min(self.size);
        if start >= end {
            return;
        }

        let first = self.first_overlapping(start);
        let last = first
            + self.ranges[first..]
                .iter()
                .take_while(|r| r.start < end)
                .count();

        let mut replacement = Vec::with_capacity((last - first) + 2);
        for range in &self.ranges[first..last] {
            if range.start < start {
                replacement.push(ByteRange::new(range.start, start - range.start, range.cached));
            }
            if let Some(overlap) = range.clip(start, end) {
                replacement.push(ByteRange::new(overlap.start, overlap.length, true));
            }
            if range.end() > end {
                replacement.push(ByteRange::new(end, range.end() - end, range.cached));
            }
        }

        self.ranges.splice(first..last, replacement);
        self.coalesce();
    }

    /// Merge each streak of adjacent ranges with the same tag into one
    pub fn coalesce(&mut self) {
        let mut merged: Vec<ByteRange> = Vec::with_capacity(self.ranges.len());
        for range in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if last.cached == range.cached && last.end() == range.start => {
                    *last = ByteRange::new(last.start, last.length + range.length, last.cached);
                }
                _ => merged.push(range),
            }
        }
        self.ranges = merged;
    }

    /// Check that the ranges tile `[0, size)` exactly once
    pub fn verify_tiling(&self) -> Result<(), String> {
        let mut expected = 0;
        for range in &self.ranges {
            if range.is_empty() {
                return Err(format!("empty range at {}", range.start));
            }
            if range.start != expected {
                return Err(format!(
                    "range {range} starts at {}, expected {expected}",
                    range.start
                ));
            }
            expected = range.end();
        }

        if expected != self.size {
            return Err(format!("ranges end at {expected}, size is {}", self.size));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_split_in_the_middle() {
        let mut list = RangeList::new(100);
        list.mark_cached(10, 20);

        assert_eq!(
            list.ranges(),
            &[
                ByteRange::new(0, 10, false),
                ByteRange::new(10, 20, true),
                ByteRange::new(30, 70, false),
            ]
        );
        assert_eq!(list.cached_bytes(), 20);
    }

    #[test]
    fn test_adjacent_marks_coalesce() {
        let mut list = RangeList::new(50);
        list.mark_cached(0, 10);
        list.mark_cached(20, 10);
        list.mark_cached(10, 10);

        assert_eq!(
            list.ranges(),
            &[ByteRange::new(0, 30, true), ByteRange::new(30, 20, false)]
        );
    }

    #[test]
    fn test_plan_clips_to_target() {
        let mut list = RangeList::new(40);
        list.mark_cached(10, 10);

        assert_eq!(
            list.plan(5, 20),
            vec![
                ByteRange::new(5, 5, false),
                ByteRange::new(10, 10, true),
                ByteRange::new(20, 5, false),
            ]
        );
        assert_eq!(list.plan(35, 100), vec![ByteRange::new(35, 5, false)]);
        assert!(list.plan(40, 1).is_empty());
    }

    #[test]
    fn test_empty_source() {
        let mut list = RangeList::new(0);
        list.mark_cached(0, 10);
        assert!(list.is_empty());
        assert!(list.verify_tiling().is_ok());
    }

    #[test]
    fn test_verify_detects_gap() {
        let list = RangeList {
            size: 10,
            ranges: vec![ByteRange::new(0, 4, true), ByteRange::new(5, 5, false)],
        };
        assert!(list.verify_tiling().is_err());
    }

    proptest! {
        #[test]
        fn prop_marks_keep_tiling(
            size in 1u64..4096,
            marks in prop::collection::vec((0u64..4096, 0u64..1024), 0..32),
        ) {
            let mut list = RangeList::new(size);
            let mut truth = vec![false; size as usize];

            for (start, length) in marks {
                list.mark_cached(start, length);
                let end = start.saturating_add(length).min(size);
                for byte in start..end {
                    truth[byte as usize] = true;
                }
                prop_assert!(list.verify_tiling().is_ok(), "{:?}", list);
            }

            for range in list.ranges() {
                for byte in range.start..range.end() {
                    prop_assert_eq!(truth[byte as usize], range.cached);
                }
            }
            for pair in list.ranges().windows(2) {
                prop_assert_ne!(pair[0].cached, pair[1].cached);
            }
        }
    }
}
