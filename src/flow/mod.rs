//! The dataflow engine: nodes, the graph that connects them, the
//! collector that terminates a flow, and sources that feed it.

pub mod collector;
pub mod graph;
pub mod node;
pub mod pipeline;
pub mod source;

pub use collector::{Collector, FacetBatches};
pub use graph::{AnyNode, FlowGraph, NodeId, NodeStats};
pub use node::{make_mut, Behavior, FlowNode, Output};
pub use pipeline::Pipeline;
pub use source::InlineSource;

use crate::datum::Datum;
use crate::error::Result;

/// Run `data` through a single node and return what reaches a collector
/// attached to it.
///
/// ```
/// use gritflow::flow::process_data;
/// use gritflow::transforms::Sample;
/// use gritflow::Datum;
///
/// let data: Vec<Datum> = (0..3).map(|i| Datum::from([("i", i)])).collect();
/// let out = process_data(Sample::new(10, None), data.clone()).unwrap();
/// assert_eq!(out, data);
/// ```
pub fn process_data(node: impl FlowNode + 'static, data: Vec<Datum>) -> Result<Vec<Datum>> {
    let mut graph = FlowGraph::new();
    let head = graph.add_transform(node);
    let collector = graph.append(head, Collector::new())?;

    InlineSource::new(data).push_into(&mut graph, head)?;

    match graph.collector(collector) {
        Some(c) => Ok(c.get_data()?.cloned().collect()),
        None => Ok(Vec::new()),
    }
}
