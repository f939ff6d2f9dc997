//! In-memory sorted merge-join.
//!
//! This is the linear-time comparison at the heart of every reconciliation
//! axis. The cursor-backed reconcilers ([`crate::buckets`],
//! [`crate::granules`]) inline the same walk over `peek`/`shift`; this module
//! holds the pure form used where both sequences are already materialized
//! (collection lists are bounded, so they are compared in memory).

use serde::{Deserialize, Serialize};

/// Direction semantics of a comparison.
///
/// Under `OneWay`, entries exclusive to the *catalog* side (the first
/// sequence) are skipped entirely: the opposing side is known to be a
/// filtered subset, so "only in catalog" would be meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareMode {
    /// Report drift in both directions.
    TwoWay,
    /// Report drift only on the non-catalog side.
    OneWay,
}

impl CompareMode {
    /// Returns true for one-way comparisons.
    #[must_use]
    pub fn is_one_way(self) -> bool {
        matches!(self, Self::OneWay)
    }
}

/// Outcome of a merge-join over two sorted sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult<T> {
    /// Items present in both sequences, in order.
    pub matched: Vec<T>,
    /// Items exclusive to the first sequence, in order. Always empty under
    /// one-way mode.
    pub only_left: Vec<T>,
    /// Items exclusive to the second sequence, in order.
    pub only_right: Vec<T>,
}

/// Merge-joins two sequences sorted ascending by `Ord`.
///
/// Every input item is accounted for exactly once across the three output
/// lists, except left-exclusive items under one-way mode, which are skipped.
/// Behavior on unsorted input is undefined.
#[must_use]
pub fn merge_sorted<T: Ord>(left: Vec<T>, right: Vec<T>, mode: CompareMode) -> MergeResult<T> {
    let mut result = MergeResult {
        matched: Vec::new(),
        only_left: Vec::new(),
        only_right: Vec::new(),
    };

    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();

    loop {
        match (left.peek(), right.peek()) {
            (None, None) => break,
            (Some(_), None) => {
                if let Some(l) = left.next() {
                    if !mode.is_one_way() {
                        result.only_left.push(l);
                    }
                }
            }
            (None, Some(_)) => {
                if let Some(r) = right.next() {
                    result.only_right.push(r);
                }
            }
            (Some(l), Some(r)) => match l.cmp(r) {
                std::cmp::Ordering::Less => {
                    if let Some(l) = left.next() {
                        if !mode.is_one_way() {
                            result.only_left.push(l);
                        }
                    }
                }
                std::cmp::Ordering::Greater => {
                    if let Some(r) = right.next() {
                        result.only_right.push(r);
                    }
                }
                std::cmp::Ordering::Equal => {
                    right.next();
                    if let Some(l) = left.next() {
                        result.matched.push(l);
                    }
                }
            },
        }
    }

    result
}
