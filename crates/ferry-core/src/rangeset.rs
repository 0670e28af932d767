use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::CustodyId;

/// Inclusive custody-ID interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CidRange {
    pub first: CustodyId,
    pub last: CustodyId,
}

impl CidRange {
    pub fn single(cid: CustodyId) -> Self {
        CidRange { first: cid, last: cid }
    }

    /// Number of CIDs covered, saturating at `u64::MAX`.
    pub fn cid_count(&self) -> u64 {
        self.last.saturating_sub(self.first).saturating_add(1)
    }

    pub fn contains(&self, cid: CustodyId) -> bool {
        self.first <= cid && cid <= self.last
    }
}

/// Ordered set of disjoint, non-adjacent custody-ID ranges.
///
/// Keyed by range start with inclusive end as value. Inserts merge with
/// touching neighbors, so the stored form is always minimal: `{5,6,7}`
/// is one range, never three.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CidRangeSet {
    ranges: BTreeMap<u64, u64>,
}

impl CidRangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts one CID, merging with any touching neighbor ranges.
    ///
    /// Returns false when the CID was already covered.
    pub fn insert(&mut self, cid: CustodyId) -> bool {
        let mut merged_first = cid;
        let mut merged_last = cid;

        if let Some((&left_first, &left_last)) = self.ranges.range(..=cid).next_back() {
            if cid <= left_last {
                return false;
            }
            if left_last.checked_add(1) == Some(cid) {
                merged_first = left_first;
            }
        }

        // Disjointness means a right neighbor can only touch by starting
        // exactly at cid + 1.
        if let Some(next) = cid.checked_add(1) {
            if let Some(&right_last) = self.ranges.get(&next) {
                merged_last = right_last;
                self.ranges.remove(&next);
            }
        }

        self.ranges.insert(merged_first, merged_last);
        true
    }

    /// Membership test, `O(log n)`.
    pub fn contains(&self, cid: CustodyId) -> bool {
        self.ranges
            .range(..=cid)
            .next_back()
            .map_or(false, |(_, &last)| cid <= last)
    }

    /// Ranges in ascending order; the canonical form fed to the encoder.
    pub fn ranges(&self) -> impl Iterator<Item = CidRange> + '_ {
        self.ranges
            .iter()
            .map(|(&first, &last)| CidRange { first, last })
    }

    /// Lowest range, if any.
    pub fn first(&self) -> Option<CidRange> {
        self.ranges
            .iter()
            .next()
            .map(|(&first, &last)| CidRange { first, last })
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of stored ranges (one fill each on the wire).
    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    /// Total number of covered CIDs, saturating at `u64::MAX`.
    pub fn cid_count(&self) -> u64 {
        self.ranges()
            .fold(0_u64, |total, range| total.saturating_add(range.cid_count()))
    }

    /// Drops the first `n` ranges; used after a partial flush encoded
    /// only a prefix of the set.
    pub fn remove_leading(&mut self, n: usize) {
        for _ in 0..n {
            if self.ranges.pop_first().is_none() {
                break;
            }
        }
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }
}
