//! Node abstraction for the flow graph.
//!
//! A node consumes one record at a time in [`FlowNode::handle`] and writes
//! zero, one or many derived records into an [`Output`]. The graph forwards
//! everything in the output to the node's children. Batch markers arrive
//! through [`FlowNode::begin_batch`] before they are forwarded, which gives
//! buffering nodes a chance to flush the previous window.

use crate::batch::FlowBatch;
use crate::datum::{Datum, Record};
use crate::error::Result;
use std::fmt;

/// Data-ownership contract of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Behavior {
    /// Passes records through unmodified. Safe to share with siblings.
    None,
    /// Mutates incoming records in place. Must not share its input with a
    /// sibling; the graph inserts a clone step in front of it when needed.
    Modifies,
    /// Always allocates new records. Safe for any fan-out.
    Clones,
    /// Retains the records it sees. Downstream nodes must not mutate them.
    Collects,
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Behavior::None => "none",
            Behavior::Modifies => "modifies",
            Behavior::Clones => "clones",
            Behavior::Collects => "collects",
        };
        write!(f, "{}", s)
    }
}

/// Records propagated by a node during one call.
#[derive(Debug, Default)]
pub struct Output {
    records: Vec<Record>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Propagate a record to the children.
    #[inline]
    pub fn propagate(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Propagate a freshly built datum.
    #[inline]
    pub fn propagate_datum(&mut self, datum: Datum) {
        self.records.push(datum.into_record());
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub(crate) fn drain(&mut self) -> std::vec::Drain<'_, Record> {
        self.records.drain(..)
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }

    /// Consumes the output, returning the propagated records.
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// A processing node.
///
/// Nodes validate their configuration eagerly in their constructors.
/// Per-record problems are returned from `handle` as
/// [`FlowError::InvalidInput`](crate::FlowError::InvalidInput).
pub trait FlowNode {
    /// Human-readable label, used when describing the graph.
    fn label(&self) -> &str;

    fn behavior(&self) -> Behavior {
        Behavior::None
    }

    /// Consume one record.
    fn handle(&mut self, record: Record, out: &mut Output) -> Result<()>;

    /// A batch boundary is about to be forwarded. Flush pending state into
    /// `out` if the node buffers per window.
    fn begin_batch(&mut self, _batch: &FlowBatch, _out: &mut Output) -> Result<()> {
        Ok(())
    }

    /// End of stream. All buffered output must be flushed into `out` and
    /// buffers released.
    fn complete(&mut self, _out: &mut Output) -> Result<()> {
        Ok(())
    }

    /// Return to the constructed state.
    fn reset(&mut self) {}
}

/// Copy-on-write access to a record that a `Modifies` node is about to
/// change. Free when the node is the record's only owner.
#[inline]
pub fn make_mut(record: &mut Record) -> &mut Datum {
    std::rc::Rc::make_mut(record)
}
