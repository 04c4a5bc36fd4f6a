//! Sort validation for sweep-line transforms.
//!
//! Sweep-line algorithms require sorted input. The validator checks, as
//! records stream through, that:
//! 1. All records for a chromosome are contiguous (no interleaving)
//! 2. Within a chromosome, start positions are non-decreasing
//!
//! Any consistent chromosome order is accepted (lexicographic, genome
//! order, ...).

use crate::error::{FlowError, Result};
use rustc_hash::FxHashSet;

/// Inline sort validator for use within streaming transforms.
#[derive(Debug)]
pub struct SortValidator {
    transform: &'static str,
    prev_chrom: Option<String>,
    prev_start: f64,
    seen_chroms: FxHashSet<String>,
    record_count: usize,
}

impl SortValidator {
    /// Create a validator that reports errors on behalf of `transform`.
    pub fn new(transform: &'static str) -> Self {
        Self {
            transform,
            prev_chrom: None,
            prev_start: f64::NEG_INFINITY,
            seen_chroms: FxHashSet::default(),
            record_count: 0,
        }
    }

    /// Validate that the given record maintains sort order.
    ///
    /// Records without a chromosome pass an empty string.
    #[inline]
    pub fn validate(&mut self, chrom: &str, start: f64) -> Result<()> {
        self.record_count += 1;

        match &self.prev_chrom {
            Some(pc) if pc == chrom => {
                if start < self.prev_start {
                    return Err(FlowError::input(
                        self.transform,
                        format!(
                            "input not sorted: position {} at record {} comes after {} on '{}'",
                            start, self.record_count, self.prev_start, chrom
                        ),
                    ));
                }
            }
            Some(pc) => {
                // Switching chromosomes - check we haven't seen this one before
                if self.seen_chroms.contains(chrom) {
                    return Err(FlowError::input(
                        self.transform,
                        format!(
                            "input not sorted: chromosome '{}' at record {} was seen earlier (chromosomes must be contiguous)",
                            chrom, self.record_count
                        ),
                    ));
                }
                self.seen_chroms.insert(pc.clone());
                self.prev_chrom = Some(chrom.to_string());
            }
            None => self.prev_chrom = Some(chrom.to_string()),
        }

        self.prev_start = start;
        Ok(())
    }

    /// Reset validator state (for a new facet or file).
    pub fn reset(&mut self) {
        self.prev_chrom = None;
        self.prev_start = f64::NEG_INFINITY;
        self.seen_chroms.clear();
        self.record_count = 0;
    }

    /// Get the number of records validated.
    pub fn record_count(&self) -> usize {
        self.record_count
    }
}
