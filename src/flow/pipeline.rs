//! Builds a linear flow from a [`PipelineSpec`].

use crate::datum::Datum;
use crate::error::{FlowError, Result};
use crate::expr::ExpressionEngine;
use crate::flow::collector::Collector;
use crate::flow::graph::{FlowGraph, NodeId};
use crate::flow::source::InlineSource;
use crate::params::{CollectParams, PipelineSpec};
use crate::transforms;

/// A chain of transforms terminated by a collector.
pub struct Pipeline {
    graph: FlowGraph,
    head: NodeId,
    collector: NodeId,
}

impl Pipeline {
    /// Construct every node, connect them and insert clone steps where
    /// needed. Configuration errors surface here.
    pub fn build(spec: &PipelineSpec, engine: &ExpressionEngine) -> Result<Self> {
        let mut graph = FlowGraph::new();
        let mut head = None;
        let mut tail: Option<NodeId> = None;

        for params in &spec.transforms {
            let node = transforms::create(params, engine)?;
            let id = match tail {
                Some(parent) => graph.append(parent, node)?,
                None => graph.add_node(node),
            };
            head.get_or_insert(id);
            tail = Some(id);
        }

        let default_params = CollectParams::default();
        let collector = Collector::with_params(spec.collect.as_ref().unwrap_or(&default_params));
        let collector = match tail {
            Some(parent) => graph.append(parent, collector)?,
            None => graph.add_node(collector),
        };
        let head = head.unwrap_or(collector);

        let clones = graph.prepare(head)?;
        tracing::debug!(
            "Built pipeline with {} nodes ({} clone steps)",
            graph.len(),
            clones
        );

        Ok(Self {
            graph,
            head,
            collector,
        })
    }

    /// Push a source through the pipeline.
    pub fn run(&mut self, source: InlineSource) -> Result<()> {
        self.graph.reset(self.head);
        source.push_into(&mut self.graph, self.head)
    }

    /// Run and return the collected records.
    pub fn process(&mut self, source: InlineSource) -> Result<Vec<Datum>> {
        self.run(source)?;
        Ok(self.collector()?.get_data()?.cloned().collect())
    }

    pub fn collector(&self) -> Result<&Collector> {
        self.graph
            .collector(self.collector)
            .ok_or_else(|| FlowError::Graph("pipeline has no collector".to_string()))
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn describe(&self) -> String {
        self.graph.describe(self.head)
    }
}
