//! Coverage depth of sorted intervals.
//!
//! A sweep line moves over the interval starts. Active intervals sit in a
//! min-heap keyed by their end with the interval's weight as the payload.
//! Each step closes the intervals that end before the next start and
//! writes a segment at the current depth for every span between edges.
//!
//! Output segments are contiguous and non-overlapping. Adjacent segments
//! with equal depth are merged, and zero-depth spans are not emitted.
//! When a chromosome field is configured, a change of chromosome drains
//! the heap and starts a fresh sweep.

use crate::batch::FlowBatch;
use crate::config;
use crate::datum::{CachedField, Datum, Record, Value};
use crate::error::{FlowError, Result};
use crate::flow::{Behavior, FlowNode, Output};
use crate::heap::MinHeap;
use crate::params::CoverageParams;
use crate::streaming::SortValidator;

/// Segment waiting to be extended by an adjacent one of equal depth.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    start: f64,
    end: f64,
    coverage: f64,
}

#[derive(Debug)]
pub struct Coverage {
    chrom: Option<CachedField>,
    start: CachedField,
    end: CachedField,
    weight: Option<CachedField>,

    as_coverage: String,
    as_start: String,
    as_end: String,
    as_chrom: Option<String>,

    /// End position as priority, weight as value
    ends: MinHeap<f64>,
    coverage: f64,
    prev_edge: Option<f64>,
    buffered: Option<Segment>,
    current_chrom: Option<Value>,
    validator: Option<SortValidator>,
}

impl Coverage {
    pub fn new(params: &CoverageParams) -> Self {
        Self {
            chrom: params.chrom.as_deref().map(CachedField::new),
            start: CachedField::new(&params.start),
            end: CachedField::new(&params.end),
            weight: params.weight.as_deref().map(CachedField::new),

            as_coverage: params
                .as_field
                .clone()
                .unwrap_or_else(|| "coverage".to_string()),
            as_start: params.as_start.clone().unwrap_or_else(|| params.start.clone()),
            as_end: params.as_end.clone().unwrap_or_else(|| params.end.clone()),
            as_chrom: params.as_chrom.clone().or_else(|| params.chrom.clone()),

            ends: MinHeap::new(),
            coverage: 0.0,
            prev_edge: None,
            buffered: None,
            current_chrom: None,
            validator: Self::make_validator(),
        }
    }

    fn make_validator() -> Option<SortValidator> {
        config::is_strict_order().then(|| SortValidator::new("coverage"))
    }

    fn number(field: &CachedField, record: &Record) -> Result<f64> {
        field.number(record).ok_or_else(|| {
            FlowError::input(
                "coverage",
                format!("the field \"{}\" is not a number", field.name()),
            )
        })
    }

    fn emit(&self, segment: Segment, out: &mut Output) {
        let mut datum = Datum::with_capacity(4);
        if let Some(as_chrom) = &self.as_chrom {
            datum.insert(
                as_chrom.as_str(),
                self.current_chrom.clone().unwrap_or_default(),
            );
        }
        datum.insert(self.as_start.as_str(), segment.start);
        datum.insert(self.as_end.as_str(), segment.end);
        datum.insert(self.as_coverage.as_str(), segment.coverage);
        out.propagate_datum(datum);
    }

    /// Extend the buffered segment or replace it, emitting the old one.
    fn push_segment(&mut self, start: f64, end: f64, coverage: f64, out: &mut Output) {
        if start == end {
            return;
        }

        if let Some(buffered) = &mut self.buffered {
            if buffered.coverage == coverage && buffered.end == start {
                buffered.end = end;
                return;
            }
        }

        if let Some(previous) = self.buffered.take() {
            if previous.coverage != 0.0 {
                self.emit(previous, out);
            }
        }
        self.buffered = Some(Segment {
            start,
            end,
            coverage,
        });
    }

    /// Close every interval that ends at or before `position`.
    fn close_until(&mut self, position: f64, out: &mut Output) {
        while let Some(edge) = self.ends.peek_priority() {
            if edge > position {
                break;
            }
            if let Some(prev) = self.prev_edge {
                self.push_segment(prev, edge, self.coverage, out);
            }
            self.prev_edge = Some(edge);
            if let Some(weight) = self.ends.pop() {
                self.coverage -= weight;
            }
        }
    }

    /// Drain the heap and emit everything that is pending.
    fn flush(&mut self, out: &mut Output) {
        self.close_until(f64::INFINITY, out);

        if let Some(segment) = self.buffered.take() {
            if segment.coverage != 0.0 {
                self.emit(segment, out);
            }
        }

        self.prev_edge = None;
        self.coverage = 0.0;
        self.ends.release();
    }
}

impl FlowNode for Coverage {
    fn label(&self) -> &str {
        "coverage"
    }

    fn behavior(&self) -> Behavior {
        Behavior::Clones
    }

    fn handle(&mut self, record: Record, out: &mut Output) -> Result<()> {
        let start = Self::number(&self.start, &record)?;
        let end = Self::number(&self.end, &record)?;
        let weight = match &self.weight {
            Some(w) => Self::number(w, &record)?,
            None => 1.0,
        };

        if let Some(chrom_field) = &self.chrom {
            let chrom = chrom_field.get(&record).cloned().unwrap_or_default();
            if self.current_chrom.as_ref() != Some(&chrom) {
                self.flush(out);
                self.current_chrom = Some(chrom);
            }
        }

        if let Some(validator) = &mut self.validator {
            let chrom = self
                .current_chrom
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_default();
            validator.validate(&chrom, start)?;
        }

        self.close_until(start, out);

        if let Some(prev) = self.prev_edge {
            self.push_segment(prev, start, self.coverage, out);
        }
        self.prev_edge = Some(start);

        self.coverage += weight;
        self.ends.push(weight, end);
        Ok(())
    }

    fn begin_batch(&mut self, batch: &FlowBatch, out: &mut Output) -> Result<()> {
        match batch {
            FlowBatch::File { .. } => {
                for field in [&self.start, &self.end] {
                    field.invalidate();
                }
                if let Some(f) = &self.chrom {
                    f.invalidate();
                }
                if let Some(f) = &self.weight {
                    f.invalidate();
                }
            }
            FlowBatch::Facet { .. } => {
                self.flush(out);
                self.current_chrom = None;
                if let Some(v) = &mut self.validator {
                    v.reset();
                }
            }
        }
        Ok(())
    }

    fn complete(&mut self, out: &mut Output) -> Result<()> {
        self.flush(out);
        Ok(())
    }

    fn reset(&mut self) {
        self.ends.release();
        self.coverage = 0.0;
        self.prev_edge = None;
        self.buffered = None;
        self.current_chrom = None;
        self.validator = Self::make_validator();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::process_data;

    fn params(weight: bool) -> CoverageParams {
        CoverageParams {
            chrom: None,
            start: "start".into(),
            end: "end".into(),
            weight: weight.then(|| "weight".to_string()),
            as_field: None,
            as_chrom: None,
            as_start: None,
            as_end: None,
        }
    }

    fn segments(out: &[Datum]) -> Vec<(f64, f64, f64)> {
        out.iter()
            .map(|d| {
                let n = |k: &str| d.get(k).and_then(Value::as_f64).unwrap();
                (n("start"), n("end"), n("coverage"))
            })
            .collect()
    }

    fn simple(reads: &[(i32, i32)]) -> Vec<(f64, f64, f64)> {
        let data = reads
            .iter()
            .map(|&(s, e)| Datum::from([("start", s), ("end", e)]))
            .collect();
        segments(&process_data(Coverage::new(&params(false)), data).unwrap())
    }

    fn weighted(reads: &[(i32, i32, i32)]) -> Vec<(f64, f64, f64)> {
        let data = reads
            .iter()
            .map(|&(s, e, w)| Datum::from([("start", s), ("end", e), ("weight", w)]))
            .collect();
        segments(&process_data(Coverage::new(&params(true)), data).unwrap())
    }

    fn triples(t: &[(i32, i32, i32)]) -> Vec<(f64, f64, f64)> {
        t.iter()
            .map(|&(a, b, c)| (a as f64, b as f64, c as f64))
            .collect()
    }

    #[test]
    fn test_typical_case() {
        assert_eq!(
            simple(&[
                (0, 4),
                (1, 3),
                (2, 6),
                (4, 8),
                (8, 10),
                (11, 14),
                (11, 13),
                (11, 12),
                (15, 18),
                (16, 18),
                (17, 18),
            ]),
            triples(&[
                (0, 1, 1),
                (1, 2, 2),
                (2, 3, 3),
                (3, 6, 2),
                (6, 10, 1),
                (11, 12, 3),
                (12, 13, 2),
                (13, 14, 1),
                (15, 16, 1),
                (16, 17, 2),
                (17, 18, 3),
            ])
        );
    }

    #[test]
    fn test_identical_overlapping_segments() {
        assert_eq!(
            simple(&[(1, 2), (3, 4), (3, 4), (5, 6), (5, 6), (5, 6)]),
            triples(&[(1, 2, 1), (3, 4, 2), (5, 6, 3)])
        );
    }

    #[test]
    fn test_adjacent_equal_segments_are_merged() {
        assert_eq!(
            simple(&[(1, 2), (2, 3), (3, 4), (5, 6), (6, 7), (7, 8)]),
            triples(&[(1, 4, 1), (5, 8, 1)])
        );
    }

    #[test]
    fn test_weighted() {
        assert_eq!(
            weighted(&[(0, 4, 1), (1, 3, 2), (2, 6, 3), (8, 10, -1)]),
            triples(&[
                (0, 1, 1),
                (1, 2, 3),
                (2, 3, 6),
                (3, 4, 4),
                (4, 6, 3),
                (8, 10, -1),
            ])
        );
    }

    #[test]
    fn test_multiple_weights_at_a_single_locus() {
        let mut reads = Vec::new();
        for w in 1..=5 {
            reads.push((1, 2, w));
        }
        for w in 2..=6 {
            reads.push((2, 3, w));
        }
        assert_eq!(weighted(&reads), triples(&[(1, 2, 15), (2, 3, 20)]));
    }

    #[test]
    fn test_adjacent_different_weights_are_separate() {
        assert_eq!(
            weighted(&[
                (1, 2, 2),
                (2, 3, 1),
                (3, 4, 1),
                (5, 6, 1),
                (6, 7, 2),
                (7, 8, 1),
                (9, 10, 1),
                (10, 11, 1),
                (11, 12, 2),
            ]),
            triples(&[
                (1, 2, 2),
                (2, 4, 1),
                (5, 6, 1),
                (6, 7, 2),
                (7, 8, 1),
                (9, 11, 1),
                (11, 12, 2),
            ])
        );
    }

    #[test]
    fn test_chromosomes_pass_through() {
        let mut p = params(false);
        p.chrom = Some("chrom".into());

        let data = vec![
            Datum::from([("chrom", Value::from("chr1")), ("start", Value::from(0)), ("end", Value::from(1))]),
            Datum::from([("chrom", Value::from("chr2")), ("start", Value::from(0)), ("end", Value::from(1))]),
            Datum::from([("chrom", Value::from("chr3")), ("start", Value::from(1)), ("end", Value::from(3))]),
        ];
        let out = process_data(Coverage::new(&p), data).unwrap();

        assert_eq!(
            out,
            vec![
                Datum::from([("chrom", Value::from("chr1")), ("start", Value::from(0)), ("end", Value::from(1)), ("coverage", Value::from(1))]),
                Datum::from([("chrom", Value::from("chr2")), ("start", Value::from(0)), ("end", Value::from(1)), ("coverage", Value::from(1))]),
                Datum::from([("chrom", Value::from("chr3")), ("start", Value::from(1)), ("end", Value::from(3)), ("coverage", Value::from(1))]),
            ]
        );
    }

    #[test]
    fn test_heap_state_resets_across_chromosomes() {
        let reads = [(0, 4), (1, 3), (2, 6), (4, 8), (8, 10)];
        let mut p = params(false);
        p.chrom = Some("chrom".into());

        let data = ["chrA", "chrB"]
            .iter()
            .flat_map(|c| {
                reads.iter().map(move |&(s, e)| {
                    Datum::from([
                        ("chrom", Value::from(*c)),
                        ("start", Value::from(s)),
                        ("end", Value::from(e)),
                    ])
                })
            })
            .collect();
        let out = process_data(Coverage::new(&p), data).unwrap();

        let expected = triples(&[(0, 1, 1), (1, 2, 2), (2, 3, 3), (3, 6, 2), (6, 10, 1)]);
        assert_eq!(segments(&out[..5]), expected);
        assert_eq!(segments(&out[5..]), expected);
        assert_eq!(out[4].get("chrom"), Some(&Value::from("chrA")));
        assert_eq!(out[5].get("chrom"), Some(&Value::from("chrB")));
    }

    #[test]
    fn test_output_field_names() {
        let mut p = params(false);
        p.as_field = Some("depth".into());
        p.as_start = Some("s".into());
        p.as_end = Some("e".into());
        let out = process_data(Coverage::new(&p), vec![Datum::from([("start", 0), ("end", 2)])]).unwrap();
        assert_eq!(out, vec![Datum::from([("s", 0), ("e", 2), ("depth", 1)])]);
    }

    #[test]
    fn test_missing_coordinate() {
        let result = process_data(Coverage::new(&params(false)), vec![Datum::from([("start", 0)])]);
        assert!(matches!(result, Err(FlowError::InvalidInput { .. })));
    }
}
