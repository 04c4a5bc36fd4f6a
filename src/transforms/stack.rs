//! Stacks values within groups, writing the lower and upper edge of each
//! record's slice into two fields.
//!
//! The whole input is buffered because the group sums must be known before
//! anything can be emitted. Groups are emitted in order of first
//! appearance. A facet boundary closes the current window.
//!
//! The `information` offset lays out sequence logos: the total height of a
//! stack is the information content of the position, `log2(cardinality) - H`,
//! scaled by the fraction of non-gap items. Items whose `baseField` is null
//! are gaps; they count towards the total but are not emitted.

use crate::batch::{FlowBatch, KeyPart};
use crate::datum::{Comparator, Field, Record};
use crate::error::{FlowError, Result};
use crate::flow::{make_mut, Behavior, FlowNode, Output};
use crate::params::{StackOffset, StackParams};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

#[derive(Debug, Clone)]
pub struct Stack {
    field: Option<Field>,
    groupby: Vec<Field>,
    comparator: Option<Comparator>,
    offset: StackOffset,
    as_lower: String,
    as_upper: String,
    base_field: Option<Field>,
    max_bits: f64,
    buffer: Vec<Record>,
}

impl Stack {
    pub fn new(params: &StackParams) -> Result<Self> {
        let (as_lower, as_upper) = match params.as_fields.as_deref() {
            None => ("y0".to_string(), "y1".to_string()),
            Some([lower, upper]) => (lower.clone(), upper.clone()),
            Some(other) => {
                return Err(FlowError::params(
                    "stack",
                    format!("\"as\" must have exactly two fields, got {}", other.len()),
                ))
            }
        };

        let cardinality = params.cardinality.unwrap_or(4.0);
        if params.offset == StackOffset::Information && cardinality < 1.0 {
            return Err(FlowError::params(
                "stack",
                format!("invalid cardinality {}", cardinality),
            ));
        }

        Ok(Self {
            field: params.field.as_deref().map(Field::new),
            groupby: params.groupby.iter().map(|f| Field::new(f)).collect(),
            comparator: params.sort.as_ref().map(|s| s.comparator()),
            offset: params.offset,
            as_lower,
            as_upper,
            base_field: params.base_field.as_deref().map(Field::new),
            max_bits: cardinality.log2(),
            buffer: Vec::new(),
        })
    }

    #[inline]
    fn value(&self, record: &Record) -> f64 {
        match &self.field {
            Some(field) => field.number(record).unwrap_or(0.0),
            None => 1.0,
        }
    }

    #[inline]
    fn is_excluded(&self, record: &Record) -> bool {
        self.base_field
            .as_ref()
            .is_some_and(|f| f.value(record).is_null())
    }

    /// The group-level quantity that the offset function needs.
    fn group_sum(&self, group: &[Record]) -> f64 {
        match self.offset {
            StackOffset::Zero => 0.0,
            StackOffset::Center | StackOffset::Normalize => {
                group.iter().map(|r| self.value(r)).sum()
            }
            StackOffset::Information => self.information_sum(group),
        }
    }

    fn information_sum(&self, group: &[Record]) -> f64 {
        let total: f64 = group.iter().map(|r| self.value(r)).sum();
        let non_gap: f64 = group
            .iter()
            .filter(|r| !self.is_excluded(r))
            .map(|r| self.value(r))
            .sum();

        if non_gap <= 0.0 {
            return 0.0;
        }

        let entropy: f64 = group
            .iter()
            .filter(|r| !self.is_excluded(r))
            .map(|r| self.value(r) / non_gap)
            .filter(|&p| p > 0.0)
            .map(|p| -p * p.log2())
            .sum();

        let information = self.max_bits - entropy;
        if information <= 0.0 {
            return 0.0;
        }

        // Dividing by this yields heights that add up to the information
        // content, scaled by the non-gap fraction.
        total / information
    }

    #[inline]
    fn offset(&self, v: f64, sum: f64) -> f64 {
        match self.offset {
            StackOffset::Zero => v,
            StackOffset::Center => v - sum / 2.0,
            StackOffset::Normalize | StackOffset::Information => {
                if sum == 0.0 {
                    0.0
                } else {
                    v / sum
                }
            }
        }
    }

    fn flush(&mut self, out: &mut Output) {
        if self.buffer.is_empty() {
            return;
        }

        let mut groups: IndexMap<Vec<KeyPart>, Vec<Record>, FxBuildHasher> = IndexMap::default();
        for record in std::mem::take(&mut self.buffer) {
            let key = self
                .groupby
                .iter()
                .map(|f| KeyPart::from(f.value(&record)))
                .collect();
            groups.entry(key).or_default().push(record);
        }

        tracing::trace!("stack: flushing {} groups", groups.len());

        for (_, mut group) in groups {
            if let Some(comparator) = &self.comparator {
                group.sort_by(|a, b| comparator.compare(a, b));
            }

            let sum = self.group_sum(&group);
            let mut prev = 0.0;

            for mut record in group {
                if self.is_excluded(&record) {
                    continue;
                }
                let current = prev + self.value(&record);
                let lower = self.offset(prev, sum);
                let upper = self.offset(current, sum);
                prev = current;

                let datum = make_mut(&mut record);
                datum.insert(self.as_lower.as_str(), lower);
                datum.insert(self.as_upper.as_str(), upper);
                out.propagate(record);
            }
        }
    }
}

impl FlowNode for Stack {
    fn label(&self) -> &str {
        "stack"
    }

    fn behavior(&self) -> Behavior {
        Behavior::Modifies
    }

    fn handle(&mut self, record: Record, _out: &mut Output) -> Result<()> {
        self.buffer.push(record);
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
        self.buffer = Vec::new();
        Ok(())
    }

    fn reset(&mut self) {
        self.buffer = Vec::new();
    }
}
