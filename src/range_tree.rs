//! Interval set over `u32` used to hand out small, reusable integers.
//!
//! Free space is kept as disjoint, sorted, inclusive ranges keyed by their
//! first value. Adjacent ranges are always merged, so the structure grows with
//! the number of gaps rather than with the size of the domain.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeTreeUInt {
    min: u32,
    max: u32,
    /// `start -> end` (inclusive) of every free range.
    free: BTreeMap<u32, u32>,
}

impl RangeTreeUInt {
    /// A tree owning `[min, max]`, entirely free.
    pub fn alloc(min: u32, max: u32) -> Self {
        debug_assert!(min <= max);
        let mut free = BTreeMap::new();
        free.insert(min, max);
        Self { min, max, free }
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Whether `value` is currently free.
    pub fn has(&self, value: u32) -> bool {
        self.range_containing(value).is_some()
    }

    /// Remove `value` from the free set. The caller must have checked
    /// [`Self::has`]; taking a value that is not free is a no-op.
    pub fn take(&mut self, value: u32) {
        let taken = self.retake(value);
        debug_assert!(taken, "range tree: {value} was not free");
    }

    /// Remove `value` if it is free. Returns `false` if it was already taken.
    pub fn retake(&mut self, value: u32) -> bool {
        let Some((start, end)) = self.range_containing(value) else {
            return false;
        };

        self.free.remove(&start);
        if start < value {
            self.free.insert(start, value - 1);
        }
        if value < end {
            self.free.insert(value + 1, end);
        }

        true
    }

    /// Take the lowest free value, or `None` if the domain is exhausted.
    pub fn take_any(&mut self) -> Option<u32> {
        let (&start, &end) = self.free.iter().next()?;

        self.free.remove(&start);
        if start < end {
            self.free.insert(start + 1, end);
        }

        Some(start)
    }

    /// Return `value` to the free set, merging it with its neighbours.
    pub fn release(&mut self, value: u32) {
        if value < self.min || value > self.max {
            debug_assert!(false, "range tree: {value} is out of bounds");
            return;
        }
        if self.has(value) {
            debug_assert!(false, "range tree: {value} released twice");
            return;
        }

        let before = self
            .free
            .range(..value)
            .next_back()
            .map(|(&s, &e)| (s, e))
            .filter(|&(_, e)| e.checked_add(1) == Some(value));
        let after = value
            .checked_add(1)
            .and_then(|next| self.free.get(&next).map(|&e| (next, e)));

        match (before, after) {
            (Some((s, _)), Some((next, e))) => {
                self.free.remove(&next);
                self.free.insert(s, e);
            }
            (Some((s, _)), None) => {
                self.free.insert(s, value);
            }
            (None, Some((next, e))) => {
                self.free.remove(&next);
                self.free.insert(value, e);
            }
            (None, None) => {
                self.free.insert(value, value);
            }
        }
    }

    /// Duplicate the whole tree.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// True when nothing is taken.
    pub fn is_full(&self) -> bool {
        self.free.len() == 1 && self.free.get(&self.min) == Some(&self.max)
    }

    /// True when every value is taken.
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// Number of disjoint free ranges.
    pub fn range_count(&self) -> usize {
        self.free.len()
    }

    /// Iterate the free ranges in ascending order.
    pub fn free_ranges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.free.iter().map(|(&s, &e)| (s, e))
    }

    fn range_containing(&self, value: u32) -> Option<(u32, u32)> {
        self.free
            .range(..=value)
            .next_back()
            .map(|(&s, &e)| (s, e))
            .filter(|&(_, e)| value <= e)
    }
}
