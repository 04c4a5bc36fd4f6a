//! Uniform reservoir sampling with Algorithm L.
//!
//! The first `size` records fill the reservoir. After that, the index of the
//! next record to enter the reservoir is drawn from a geometric distribution,
//! so skipped records cost nothing but a counter increment. The reservoir is
//! emitted on completion in reservoir order, which equals input order only
//! when fewer than `size` records arrived.

use crate::batch::FlowBatch;
use crate::datum::Record;
use crate::error::Result;
use crate::flow::{FlowNode, Output};
use crate::params::SampleParams;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_SAMPLE_SIZE: usize = 500;

#[derive(Debug, Clone)]
pub struct Sample {
    size: usize,
    seed: Option<u64>,
    rng: SmallRng,
    reservoir: Vec<Record>,
    /// Number of records seen in the current window.
    seen: usize,
    /// Index of the next record that replaces a reservoir slot.
    next: usize,
    w: f64,
}

impl Sample {
    pub fn new(size: usize, seed: Option<u64>) -> Self {
        let mut sample = Self {
            size,
            seed,
            rng: Self::make_rng(seed),
            reservoir: Vec::new(),
            seen: 0,
            next: 0,
            w: 1.0,
        };
        sample.restart();
        sample
    }

    pub fn from_params(params: &SampleParams) -> Self {
        Self::new(params.size.unwrap_or(DEFAULT_SAMPLE_SIZE), params.seed)
    }

    fn make_rng(seed: Option<u64>) -> SmallRng {
        match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        }
    }

    /// A uniform draw from (0, 1].
    #[inline]
    fn random(&mut self) -> f64 {
        1.0 - self.rng.gen::<f64>()
    }

    #[inline]
    fn advance(&mut self) {
        let k = self.size as f64;
        self.w *= (self.random().ln() / k).exp();
        let skip = (self.random().ln() / (1.0 - self.w).ln()).floor();
        let step = if skip.is_finite() && skip > 0.0 {
            (skip as usize).saturating_add(1)
        } else {
            1
        };
        self.next = self.next.saturating_add(step);
    }

    fn restart(&mut self) {
        self.reservoir = Vec::with_capacity(self.size.min(1024));
        self.seen = 0;
        self.w = 1.0;
        // The first replacement happens at index `size` + skip
        self.next = self.size.saturating_sub(1);
        if self.size > 0 {
            self.advance();
        }
    }

    fn flush(&mut self, out: &mut Output) {
        tracing::trace!(
            "sample: emitting {} of {} records",
            self.reservoir.len(),
            self.seen
        );
        for record in std::mem::take(&mut self.reservoir) {
            out.propagate(record);
        }
        self.restart();
    }
}

impl FlowNode for Sample {
    fn label(&self) -> &str {
        "sample"
    }

    fn handle(&mut self, record: Record, _out: &mut Output) -> Result<()> {
        if self.size == 0 {
            return Ok(());
        }

        if self.reservoir.len() < self.size {
            self.reservoir.push(record);
        } else if self.seen == self.next {
            let slot = self.rng.gen_range(0..self.size);
            self.reservoir[slot] = record;
            self.advance();
        }

        self.seen += 1;
        Ok(())
    }

    fn begin_batch(&mut self, batch: &FlowBatch, out: &mut Output) -> Result<()> {
        if batch.is_facet() {
            self.flush(out);
        }
        Ok(())
    }

    fn complete(&mut self, out: &mut Output) -> Result<()> {
        self.flush(out);
        self.reservoir = Vec::new();
        Ok(())
    }

    fn reset(&mut self) {
        self.rng = Self::make_rng(self.seed);
        self.restart();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::{Datum, Value};
    use crate::flow::process_data;
    use rustc_hash::FxHashSet;

    fn data(n: usize) -> Vec<Datum> {
        (0..n).map(|i| Datum::from([("i", i)])).collect()
    }

    fn ids(out: &[Datum]) -> Vec<usize> {
        out.iter()
            .filter_map(|d| d.get("i").and_then(Value::as_f64))
            .map(|f| f as usize)
            .collect()
    }

    #[test]
    fn test_small_input_passes_through_in_order() {
        let out = process_data(Sample::new(10, None), data(7)).unwrap();
        assert_eq!(out, data(7));
    }

    #[test]
    fn test_large_input_is_sampled() {
        let out = process_data(Sample::new(50, None), data(10_000)).unwrap();
        let ids = ids(&out);
        assert_eq!(ids.len(), 50);

        let unique: FxHashSet<usize> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 50);
        assert!(ids.iter().all(|&i| i < 10_000));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let a = process_data(Sample::new(20, Some(42)), data(5_000)).unwrap();
        let b = process_data(Sample::new(20, Some(42)), data(5_000)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_reaches_late_records() {
        // The sample should not be stuck on the first k records
        let out = process_data(Sample::new(100, Some(7)), data(100_000)).unwrap();
        assert!(ids(&out).iter().any(|&i| i >= 100));
    }

    #[test]
    fn test_zero_size() {
        assert!(process_data(Sample::new(0, None), data(5)).unwrap().is_empty());
    }

    #[test]
    fn test_default_size() {
        let s = Sample::from_params(&SampleParams::default());
        assert_eq!(s.size, DEFAULT_SAMPLE_SIZE);
    }
}
