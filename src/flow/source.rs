//! In-memory record source.
//!
//! Pushes a list of records into the head node of a graph, framed by the
//! batch protocol: a file boundary first, then optionally one facet
//! boundary per distinct value of a facet field, then `complete()`.

use crate::batch::{FacetId, FlowBatch, KeyPart};
use crate::datum::{Datum, Field};
use crate::error::Result;
use crate::flow::graph::{FlowGraph, NodeId};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

#[derive(Debug, Clone, Default)]
pub struct InlineSource {
    data: Vec<Datum>,
    url: Option<String>,
    facet_by: Vec<Field>,
}

impl InlineSource {
    pub fn new(data: Vec<Datum>) -> Self {
        Self {
            data,
            url: None,
            facet_by: Vec::new(),
        }
    }

    /// Origin of the data, announced in the file boundary.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Partition the data into facets by the values of the given fields.
    ///
    /// Records of one facet are delivered contiguously, in order of first
    /// appearance of the facet.
    pub fn with_facet_by(mut self, fields: &[String]) -> Self {
        self.facet_by = fields.iter().map(|f| Field::new(f)).collect();
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Push all records into `head` and complete the stream.
    pub fn push_into(self, graph: &mut FlowGraph, head: NodeId) -> Result<()> {
        graph.begin_batch(head, &FlowBatch::file(self.url.clone()))?;

        if self.facet_by.is_empty() {
            for datum in self.data {
                graph.handle(head, datum.into_record())?;
            }
        } else {
            let fields: Vec<String> = self.facet_by.iter().map(|f| f.name().to_string()).collect();
            let facets = self.partition();
            tracing::debug!("Pushing {} facets", facets.len());

            for (facet_id, data) in facets {
                graph.begin_batch(head, &FlowBatch::facet_with_fields(facet_id, fields.clone()))?;
                for datum in data {
                    graph.handle(head, datum.into_record())?;
                }
            }
        }

        graph.complete(head)
    }

    fn partition(self) -> IndexMap<FacetId, Vec<Datum>, FxBuildHasher> {
        let mut facets: IndexMap<FacetId, Vec<Datum>, FxBuildHasher> = IndexMap::default();
        for datum in self.data {
            let key = FacetId::new(
                self.facet_by
                    .iter()
                    .map(|f| KeyPart::from(f.value(&datum)))
                    .collect(),
            );
            facets.entry(key).or_default().push(datum);
        }
        facets
    }
}
