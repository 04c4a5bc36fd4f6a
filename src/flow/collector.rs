//! Collects (materializes) the records that reach the end of a flow.
//!
//! Records are partitioned by facet. Without faceting they end up in a
//! single bucket under the `None` key. The collected data can optionally be
//! regrouped and sorted when the stream completes.

use crate::batch::{FacetId, FlowBatch, KeyPart};
use crate::datum::{Comparator, Datum, Field, Record};
use crate::error::{FlowError, Result};
use crate::flow::node::{Behavior, FlowNode, Output};
use crate::params::CollectParams;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

/// Collected records keyed by facet. Iteration follows facet arrival order.
pub type FacetBatches = IndexMap<Option<FacetId>, Vec<Record>, FxBuildHasher>;

/// Terminal sink of a flow.
#[derive(Debug)]
pub struct Collector {
    groupby: Vec<Field>,
    comparator: Option<Comparator>,
    facet_batches: FacetBatches,
    current: Option<FacetId>,
    completed: bool,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector {
    pub fn new() -> Self {
        Self {
            groupby: Vec::new(),
            comparator: None,
            facet_batches: FacetBatches::default(),
            current: None,
            completed: false,
        }
    }

    pub fn with_params(params: &CollectParams) -> Self {
        let mut collector = Self::new();
        if let Some(groupby) = &params.groupby {
            collector.groupby = groupby.iter().map(|f| Field::new(f)).collect();
        }
        if let Some(sort) = &params.sort {
            collector.comparator = Some(sort.comparator());
        }
        collector
    }

    /// Append a record to the active facet bucket.
    #[inline]
    pub fn accept(&mut self, record: Record) {
        match self.facet_batches.get_mut(&self.current) {
            Some(bucket) => bucket.push(record),
            None => {
                self.facet_batches.insert(self.current.clone(), vec![record]);
            }
        }
    }

    /// Switch the active bucket on facet boundaries.
    pub fn on_batch(&mut self, batch: &FlowBatch) {
        if let Some(facet_id) = batch.facet_id() {
            self.current = Some(facet_id.clone());
            self.facet_batches.entry(self.current.clone()).or_default();
        }
    }

    /// Regroup and sort the collected data and mark the collector complete.
    pub fn finish(&mut self) -> Result<()> {
        self.current = None;

        if !self.groupby.is_empty() {
            self.regroup()?;
        }

        if let Some(comparator) = &self.comparator {
            for data in self.facet_batches.values_mut() {
                data.sort_by(|a, b| comparator.compare(a, b));
            }
        }

        self.completed = true;
        Ok(())
    }

    fn regroup(&mut self) -> Result<()> {
        if self.facet_batches.keys().any(Option::is_some) {
            return Err(FlowError::params(
                "collect",
                "groupby cannot be used with data that are already faceted",
            ));
        }

        let data = self.facet_batches.shift_remove(&None).unwrap_or_default();
        self.facet_batches.clear();

        for record in data {
            let key = FacetId::new(
                self.groupby
                    .iter()
                    .map(|f| KeyPart::from(f.value(&record)))
                    .collect(),
            );
            self.facet_batches.entry(Some(key)).or_default().push(record);
        }

        Ok(())
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    fn check_status(&self) -> Result<()> {
        if self.completed {
            Ok(())
        } else {
            Err(FlowError::NotCompleted)
        }
    }

    /// All collected records, facet by facet.
    pub fn get_data(&self) -> Result<impl Iterator<Item = &Datum> + '_> {
        self.check_status()?;
        Ok(self
            .facet_batches
            .values()
            .flat_map(|data| data.iter().map(|r| &**r)))
    }

    /// Records of a single facet.
    pub fn facet(&self, facet_id: Option<&FacetId>) -> Option<&[Record]> {
        self.facet_batches
            .get(&facet_id.cloned())
            .map(Vec::as_slice)
    }

    /// Per-facet record arrays for rendering and inspection.
    pub fn facet_batches(&self) -> &FacetBatches {
        &self.facet_batches
    }

    pub fn visit_data<F>(&self, mut visitor: F) -> Result<()>
    where
        F: FnMut(&Datum),
    {
        self.check_status()?;
        for data in self.facet_batches.values() {
            for record in data {
                visitor(record);
            }
        }
        Ok(())
    }

    /// Total number of collected records.
    pub fn item_count(&self) -> usize {
        self.facet_batches.values().map(Vec::len).sum()
    }

    /// Cheap copy of the batches for re-emission to downstream nodes.
    pub(crate) fn batches(&self) -> Vec<(Option<FacetId>, Vec<Record>)> {
        self.facet_batches
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn clear(&mut self) {
        self.facet_batches.clear();
        self.current = None;
        self.completed = false;
    }
}

impl FlowNode for Collector {
    fn label(&self) -> &str {
        "collect"
    }

    fn behavior(&self) -> Behavior {
        Behavior::Collects
    }

    fn handle(&mut self, record: Record, _out: &mut Output) -> Result<()> {
        self.accept(record);
        Ok(())
    }

    fn begin_batch(&mut self, batch: &FlowBatch, _out: &mut Output) -> Result<()> {
        self.on_batch(batch);
        Ok(())
    }

    fn complete(&mut self, _out: &mut Output) -> Result<()> {
        self.finish()
    }

    fn reset(&mut self) {
        self.clear();
    }
}
