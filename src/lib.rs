// Clippy allows for the whole crate
#![allow(clippy::type_complexity)]

//! gritflow: streaming dataflow transforms for genomic records
//!
//! Records flow through a tree of processing nodes. Each node consumes one
//! record at a time and propagates zero, one or many derived records to its
//! children. Batch markers (file and facet boundaries) travel through the
//! same channel. Collectors terminate the flow and keep the results,
//! partitioned by facet.
//!
//! # Features
//!
//! - **Sweep-line transforms**: coverage depth and pileup lane packing
//! - **Reshaping**: project, flatten, regex extraction and wide-to-long folds
//! - **Buffered transforms**: grouped stacking and reservoir sampling
//! - **Ownership-checked graphs**: clone steps are inserted wherever a
//!   mutating node would share its input
//!
//! # Example
//!
//! ```rust
//! use gritflow::prelude::*;
//!
//! let spec = PipelineSpec::from_json_str(
//!     r#"{"transforms": [{"type": "coverage", "start": "start", "end": "end"}]}"#,
//! )
//! .unwrap();
//! let mut pipeline = Pipeline::build(&spec, &ExpressionEngine::new()).unwrap();
//!
//! let reads = vec![
//!     Datum::from([("start", 0), ("end", 4)]),
//!     Datum::from([("start", 2), ("end", 6)]),
//! ];
//! let segments = pipeline.process(InlineSource::new(reads)).unwrap();
//! assert_eq!(segments.len(), 3);
//! ```

pub mod batch;
pub mod config;
pub mod datum;
pub mod error;
pub mod expr;
pub mod flow;
pub mod heap;
pub mod params;
pub mod streaming;
pub mod transforms;

// Re-export commonly used types
pub use batch::{FacetId, FlowBatch};
pub use datum::{Datum, Record, Value};
pub use error::{FlowError, Result};
pub use flow::{Collector, FlowGraph, FlowNode, Pipeline};
pub use params::{PipelineSpec, TransformParams};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::batch::{FacetId, FlowBatch};
    pub use crate::datum::{Datum, Field, Record, Value};
    pub use crate::error::{FlowError, Result};
    pub use crate::expr::{Evaluate, ExpressionEngine};
    pub use crate::flow::{
        process_data, AnyNode, Behavior, Collector, FlowGraph, FlowNode, InlineSource, NodeId, Output,
        Pipeline,
    };
    pub use crate::params::{CollectParams, PipelineSpec, TransformParams};
    pub use crate::transforms::{
        Coverage, Filter, FlattenCompressedExons, FlattenDelimited, Formula, Pileup, Project,
        RegexExtract, RegexFold, Sample, Stack,
    };
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn test_basic_workflow() {
        let spec = PipelineSpec::from_json_str(
            r#"{"transforms": [
                {"type": "filter", "expr": "datum.mapq >= 30"},
                {"type": "pileup", "start": "start", "end": "end"}
            ]}"#,
        )
        .unwrap();
        let mut pipeline = Pipeline::build(&spec, &ExpressionEngine::new()).unwrap();

        let reads = vec![
            Datum::from([("start", 0), ("end", 10), ("mapq", 60)]),
            Datum::from([("start", 2), ("end", 5), ("mapq", 0)]),
            Datum::from([("start", 3), ("end", 8), ("mapq", 40)]),
        ];
        let out = pipeline.process(InlineSource::new(reads)).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[1].get("lane"), Some(&Value::from(1)));
    }

    #[test]
    fn test_branching_workflow() {
        let engine = ExpressionEngine::new();
        let mut graph = FlowGraph::new();

        let head = graph.add_node(Collector::new());
        let double = engine.compile("datum.x * 2").unwrap();
        let triple = engine.compile("datum.x * 3").unwrap();
        let a = graph.append(head, AnyNode::transform(Formula::new(double, "x"))).unwrap();
        let b = graph.append(head, AnyNode::transform(Formula::new(triple, "x"))).unwrap();
        let ca = graph.append(a, Collector::new()).unwrap();
        let cb = graph.append(b, Collector::new()).unwrap();

        // Both formulas hang under a collector and need their own copies
        assert_eq!(graph.prepare(head).unwrap(), 2);

        InlineSource::new(vec![Datum::from([("x", 1)])])
            .push_into(&mut graph, head)
            .unwrap();

        let x = |id| {
            graph
                .collector(id)
                .unwrap()
                .get_data()
                .unwrap()
                .map(|d: &Datum| d.get("x").cloned().unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(x(head), vec![Value::from(1)]);
        assert_eq!(x(ca), vec![Value::from(2)]);
        assert_eq!(x(cb), vec![Value::from(3)]);
    }
}
