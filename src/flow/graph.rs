//! Flow graph: a fan-out tree of nodes stored in an arena.
//!
//! Nodes are addressed by [`NodeId`]. A node has at most one parent, so the
//! graph is a forest of trees rooted at the nodes that sources push into.
//!
//! Propagation is synchronous and depth-first: a record handled by a node
//! reaches all of the node's descendants before the next record is handled.
//! Records are shared between siblings; [`FlowGraph::prepare`] inserts a
//! clone step wherever a `Modifies` node would otherwise share its input.

use crate::batch::{FacetId, FlowBatch};
use crate::datum::{Datum, Record};
use crate::error::{FlowError, Result};
use crate::flow::collector::Collector;
use crate::flow::node::{Behavior, FlowNode, Output};
use crate::transforms::clone::CloneTransform;
use std::fmt::{self, Write};
use std::rc::Rc;

/// Handle of a node within a [`FlowGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Statistics of the records a node has propagated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeStats {
    pub count: usize,
    pub first: Option<Datum>,
}

impl NodeStats {
    #[inline]
    fn record(&mut self, record: &Record) {
        if self.count == 0 {
            self.first = Some(Datum::clone(record));
        }
        self.count += 1;
    }
}

/// Either a transform (dynamic dispatch) or a collector (typed access).
pub enum AnyNode {
    Transform(Box<dyn FlowNode>),
    Collector(Collector),
}

impl AnyNode {
    pub fn transform(node: impl FlowNode + 'static) -> Self {
        AnyNode::Transform(Box::new(node))
    }

    #[inline]
    fn node(&self) -> &dyn FlowNode {
        match self {
            AnyNode::Transform(n) => n.as_ref(),
            AnyNode::Collector(c) => c,
        }
    }

    #[inline]
    fn node_mut(&mut self) -> &mut dyn FlowNode {
        match self {
            AnyNode::Transform(n) => n.as_mut(),
            AnyNode::Collector(c) => c,
        }
    }
}

impl From<Collector> for AnyNode {
    fn from(c: Collector) -> Self {
        AnyNode::Collector(c)
    }
}

impl From<Box<dyn FlowNode>> for AnyNode {
    fn from(n: Box<dyn FlowNode>) -> Self {
        AnyNode::Transform(n)
    }
}

struct Slot {
    node: AnyNode,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    stats: NodeStats,
    completed: bool,
    scratch: Output,
}

/// Arena of flow nodes.
#[derive(Default)]
pub struct FlowGraph {
    slots: Vec<Slot>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a detached node.
    pub fn add_node(&mut self, node: impl Into<AnyNode>) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Slot {
            node: node.into(),
            parent: None,
            children: Vec::new(),
            stats: NodeStats::default(),
            completed: false,
            scratch: Output::new(),
        });
        id
    }

    /// Add a detached transform node.
    pub fn add_transform(&mut self, node: impl FlowNode + 'static) -> NodeId {
        self.add_node(AnyNode::transform(node))
    }

    /// Add a node as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, node: impl Into<AnyNode>) -> Result<NodeId> {
        self.check(parent)?;
        let id = self.add_node(node);
        self.add_child(parent, id)?;
        Ok(id)
    }

    /// Connect a detached node as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check(parent)?;
        self.check(child)?;

        if self.slots[child.0].parent.is_some() {
            return Err(FlowError::Graph(format!(
                "Cannot add the child {}! It already has a parent.",
                child
            )));
        }

        // Walk up from the parent; reaching the child means a cycle
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(FlowError::Graph(format!(
                    "Adding {} under {} would create a cycle",
                    child, parent
                )));
            }
            cursor = self.slots[id.0].parent;
        }

        self.slots[parent.0].children.push(child);
        self.slots[child.0].parent = Some(parent);
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check(parent)?;
        let children = &mut self.slots[parent.0].children;
        match children.iter().position(|&c| c == child) {
            Some(index) => {
                children.remove(index);
                self.slots[child.0].parent = None;
                Ok(())
            }
            None => Err(FlowError::Graph(format!(
                "Trying to remove an unknown child {} from {}",
                child, parent
            ))),
        }
    }

    /// Insert a detached node between `node` and its parent.
    pub fn insert_as_parent(&mut self, node: NodeId, new_parent: NodeId) -> Result<()> {
        self.check(node)?;
        self.check(new_parent)?;

        let parent = self.slots[node.0].parent.ok_or_else(|| {
            FlowError::Graph(format!("Cannot insert a new parent for a root node {}", node))
        })?;

        let np = &self.slots[new_parent.0];
        if np.parent.is_some() || !np.children.is_empty() {
            return Err(FlowError::Graph(format!(
                "Node {} must be detached before it can be inserted",
                new_parent
            )));
        }

        let siblings = &mut self.slots[parent.0].children;
        if let Some(index) = siblings.iter().position(|&c| c == node) {
            siblings[index] = new_parent;
        }
        self.slots[new_parent.0].parent = Some(parent);
        self.slots[node.0].parent = None;
        self.add_child(new_parent, node)
    }

    /// Remove a node and connect its parent directly to its child.
    ///
    /// Only terminal nodes and nodes with a single child can be excised.
    pub fn excise(&mut self, node: NodeId) -> Result<()> {
        self.check(node)?;

        let parent = self.slots[node.0]
            .parent
            .ok_or_else(|| FlowError::Graph(format!("Cannot excise root node {}", node)))?;

        match self.slots[node.0].children.len() {
            0 => self.remove_child(parent, node),
            1 => {
                let child = self.slots[node.0].children[0];
                let siblings = &mut self.slots[parent.0].children;
                if let Some(index) = siblings.iter().position(|&c| c == node) {
                    siblings[index] = child;
                }
                self.slots[child.0].parent = Some(parent);
                self.slots[node.0].parent = None;
                self.slots[node.0].children.clear();
                Ok(())
            }
            _ => Err(FlowError::Graph(format!(
                "Cannot excise node {} that has multiple children",
                node
            ))),
        }
    }

    #[inline]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.slots.get(node.0).and_then(|s| s.parent)
    }

    #[inline]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.slots
            .get(node.0)
            .map(|s| s.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_root(&self, node: NodeId) -> bool {
        self.parent(node).is_none()
    }

    pub fn is_branching(&self, node: NodeId) -> bool {
        self.children(node).len() > 1
    }

    pub fn is_terminal(&self, node: NodeId) -> bool {
        self.children(node).is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn label(&self, node: NodeId) -> Option<&str> {
        self.slots.get(node.0).map(|s| s.node.node().label())
    }

    pub fn behavior(&self, node: NodeId) -> Option<Behavior> {
        self.slots.get(node.0).map(|s| s.node.node().behavior())
    }

    pub fn collector(&self, node: NodeId) -> Option<&Collector> {
        match self.slots.get(node.0).map(|s| &s.node) {
            Some(AnyNode::Collector(c)) => Some(c),
            _ => None,
        }
    }

    pub fn stats(&self, node: NodeId) -> Option<&NodeStats> {
        self.slots.get(node.0).map(|s| &s.stats)
    }

    pub fn is_completed(&self, node: NodeId) -> bool {
        self.slots.get(node.0).is_some_and(|s| s.completed)
    }

    /// Visit the subtree rooted at `root` in depth-first pre-order.
    pub fn visit<F: FnMut(NodeId)>(&self, root: NodeId, visitor: &mut F) {
        if root.0 >= self.slots.len() {
            return;
        }
        visitor(root);
        for &child in &self.slots[root.0].children {
            self.visit(child, visitor);
        }
    }

    /// Indented dump of the subtree rooted at `root`.
    pub fn describe(&self, root: NodeId) -> String {
        let mut s = String::new();
        self.describe_into(root, 0, &mut s);
        s
    }

    fn describe_into(&self, node: NodeId, depth: usize, s: &mut String) {
        let Some(slot) = self.slots.get(node.0) else {
            return;
        };
        let n = slot.node.node();
        let _ = writeln!(
            s,
            "{}* {} [{}]",
            "  ".repeat(depth),
            n.label(),
            n.behavior()
        );
        for &child in &slot.children {
            self.describe_into(child, depth + 1, s);
        }
    }

    /// Validate the ownership rules of the subtree rooted at `root`.
    ///
    /// A `Modifies` node must be the sole consumer of its input. Whenever
    /// such a node hangs under a branching or collecting parent, a clone
    /// step is inserted in front of it. Returns the number of clones
    /// inserted.
    pub fn prepare(&mut self, root: NodeId) -> Result<usize> {
        self.check(root)?;

        let mut nodes = Vec::new();
        self.visit(root, &mut |id| nodes.push(id));

        let mut inserted = 0;
        for parent in nodes {
            let shares_input = self.is_branching(parent)
                || self.behavior(parent) == Some(Behavior::Collects);
            if !shares_input {
                continue;
            }

            let modifying: Vec<NodeId> = self
                .children(parent)
                .iter()
                .copied()
                .filter(|&c| self.behavior(c) == Some(Behavior::Modifies))
                .collect();

            for child in modifying {
                let clone = self.add_transform(CloneTransform::new());
                self.insert_as_parent(child, clone)?;
                inserted += 1;
                tracing::debug!(
                    "Inserted clone step in front of {} ({})",
                    child,
                    self.label(child).unwrap_or("?")
                );
            }
        }

        Ok(inserted)
    }

    /// Push one record into a node.
    pub fn handle(&mut self, node: NodeId, record: Record) -> Result<()> {
        let slot = &mut self.slots[node.0];
        let mut out = std::mem::take(&mut slot.scratch);
        let result = slot.node.node_mut().handle(record, &mut out);
        let result = result.and_then(|()| self.forward(node, &mut out));
        self.restore_scratch(node, out);
        result
    }

    /// Announce a batch boundary to a node and its descendants.
    ///
    /// The node may flush pending output first; that output reaches the
    /// children before the marker does.
    pub fn begin_batch(&mut self, node: NodeId, batch: &FlowBatch) -> Result<()> {
        let slot = &mut self.slots[node.0];
        let mut out = std::mem::take(&mut slot.scratch);
        let result = slot.node.node_mut().begin_batch(batch, &mut out);
        let result = result.and_then(|()| self.forward(node, &mut out));
        self.restore_scratch(node, out);
        result?;

        // Collectors re-emit their batches on completion
        if matches!(self.slots[node.0].node, AnyNode::Collector(_)) {
            return Ok(());
        }

        for i in 0..self.slots[node.0].children.len() {
            let child = self.slots[node.0].children[i];
            self.begin_batch(child, batch)?;
        }
        Ok(())
    }

    /// Signal end of stream to a node and its descendants.
    pub fn complete(&mut self, node: NodeId) -> Result<()> {
        let slot = &mut self.slots[node.0];
        let mut out = std::mem::take(&mut slot.scratch);
        let result = slot.node.node_mut().complete(&mut out);
        let result = result.and_then(|()| self.forward(node, &mut out));
        self.restore_scratch(node, out);
        result?;

        if let AnyNode::Collector(collector) = &self.slots[node.0].node {
            if !self.slots[node.0].children.is_empty() {
                let batches = collector.batches();
                self.emit_batches(node, batches)?;
            }
        }

        let slot = &mut self.slots[node.0];
        slot.completed = true;
        tracing::debug!(
            "Completed {} ({}): {} records propagated",
            node,
            slot.node.node().label(),
            slot.stats.count
        );

        for i in 0..self.slots[node.0].children.len() {
            let child = self.slots[node.0].children[i];
            self.complete(child)?;
        }
        Ok(())
    }

    /// Return a node and its descendants to their constructed state.
    pub fn reset(&mut self, node: NodeId) {
        let Some(slot) = self.slots.get_mut(node.0) else {
            return;
        };
        slot.node.node_mut().reset();
        slot.stats = NodeStats::default();
        slot.completed = false;

        for i in 0..self.slots[node.0].children.len() {
            let child = self.slots[node.0].children[i];
            self.reset(child);
        }
    }

    /// Re-send the data stored in a completed collector to its descendants.
    pub fn repropagate(&mut self, node: NodeId) -> Result<()> {
        self.check(node)?;
        let batches = match &self.slots[node.0].node {
            AnyNode::Collector(c) if c.is_completed() => c.batches(),
            AnyNode::Collector(_) => return Err(FlowError::NotCompleted),
            AnyNode::Transform(_) => {
                return Err(FlowError::Graph(format!(
                    "Cannot repropagate data, {} stores no data",
                    node
                )))
            }
        };

        let children = self.slots[node.0].children.clone();
        for &child in &children {
            self.reset(child);
        }
        self.emit_batches(node, batches)?;
        for &child in &children {
            self.complete(child)?;
        }
        Ok(())
    }

    fn emit_batches(
        &mut self,
        node: NodeId,
        batches: Vec<(Option<FacetId>, Vec<Record>)>,
    ) -> Result<()> {
        let file = FlowBatch::file(None);
        for i in 0..self.slots[node.0].children.len() {
            let child = self.slots[node.0].children[i];
            self.begin_batch(child, &file)?;
        }

        for (facet_id, records) in batches {
            if let Some(facet_id) = facet_id {
                let batch = FlowBatch::facet(facet_id);
                for i in 0..self.slots[node.0].children.len() {
                    let child = self.slots[node.0].children[i];
                    self.begin_batch(child, &batch)?;
                }
            }
            let mut out = Output::from_records(records);
            self.forward(node, &mut out)?;
        }
        Ok(())
    }

    /// Hand the records in `out` to the children of `node`.
    fn forward(&mut self, node: NodeId, out: &mut Output) -> Result<()> {
        for record in out.drain() {
            let slot = &mut self.slots[node.0];
            slot.stats.record(&record);

            let n = slot.children.len();
            if n == 0 {
                continue;
            }
            for i in 0..n - 1 {
                let child = self.slots[node.0].children[i];
                self.handle(child, Rc::clone(&record))?;
            }
            let last = self.slots[node.0].children[n - 1];
            self.handle(last, record)?;
        }
        Ok(())
    }

    fn restore_scratch(&mut self, node: NodeId, mut out: Output) {
        out.clear();
        self.slots[node.0].scratch = out;
    }

    fn check(&self, node: NodeId) -> Result<()> {
        if node.0 < self.slots.len() {
            Ok(())
        } else {
            Err(FlowError::Graph(format!("Unknown node {}", node)))
        }
    }
}
