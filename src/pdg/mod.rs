//! Program dependence graphs
//!
//! In-memory PDG built on petgraph, the DOT reader/writer for the
//! extractor's graph-description files, and the extractor wrapper itself.

pub mod dot;
pub mod extract;
mod model;

pub use extract::{ExtractError, JarExtractor, PdgExtractor};
pub use model::{EdgeKind, NodeRole, PdgEdge, PdgNode, Polarity, Span};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};

/// A directed PDG with nodes addressable by their extractor id.
///
/// Nodes and edges iterate in insertion order, so anything derived from a
/// graph is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Pdg {
    graph: DiGraph<PdgNode, PdgEdge>,
    /// Node lookup by id
    node_index: HashMap<String, NodeIndex>,
    /// (source, target, kind) triples already present
    edge_keys: HashSet<(NodeIndex, NodeIndex, EdgeKind)>,
}

impl Pdg {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, replacing the attributes of an existing node with the same id.
    pub fn add_node(&mut self, node: PdgNode) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(&node.id) {
            self.graph[idx] = node;
            return idx;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.node_index.insert(id, idx);
        idx
    }

    /// Index of `id`, creating a bare placeholder node if it is unknown.
    pub fn ensure_node(&mut self, id: &str) -> NodeIndex {
        match self.node_index.get(id) {
            Some(&idx) => idx,
            None => self.add_node(PdgNode::new(id, id)),
        }
    }

    /// Add a directed edge between two known ids.
    ///
    /// Returns `false` when either end is unknown or an edge of the same
    /// kind already joins them.
    pub fn add_edge(&mut self, source: &str, target: &str, edge: PdgEdge) -> bool {
        let (Some(&s), Some(&t)) = (self.node_index.get(source), self.node_index.get(target))
        else {
            return false;
        };
        if !self.edge_keys.insert((s, t, edge.kind.clone())) {
            return false;
        }
        self.graph.add_edge(s, t, edge);
        true
    }

    pub fn node(&self, id: &str) -> Option<&PdgNode> {
        self.node_index.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut PdgNode> {
        self.node_index.get(id).map(|&idx| &mut self.graph[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PdgNode> {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut PdgNode> {
        self.graph.node_weights_mut()
    }

    /// Edges as (source id, target id, edge) in insertion order
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &PdgEdge)> {
        self.graph.edge_references().map(move |e| {
            (
                self.graph[e.source()].id.as_str(),
                self.graph[e.target()].id.as_str(),
                e.weight(),
            )
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Nodes carrying a change polarity
    pub fn colored_nodes(&self) -> impl Iterator<Item = &PdgNode> {
        self.nodes().filter(|n| n.polarity.is_colored())
    }

    /// Stamp every node with its owning file
    pub fn set_filepath(&mut self, filepath: &str) {
        for node in self.graph.node_weights_mut() {
            node.filepath = Some(filepath.to_string());
        }
    }
}
