//! Stable indexing for solver integration.
//!
//! Maps one flow system's nodes and pipes to contiguous indices (0..N) so a
//! hydraulic solver can lay them out in flat arrays.

use hd_core::EntityId;

use crate::graph::Graph;

/// Index map over one system sub-graph.
#[derive(Debug, Clone)]
pub struct SystemIndexMap {
    system: String,

    /// Contiguous list of node ids (index -> EntityId).
    node_ids: Vec<EntityId>,

    /// Contiguous list of pipe ids (index -> EntityId).
    pipe_ids: Vec<EntityId>,

    /// Reverse lookup sized to the graph; None if the entity is not a member.
    node_to_idx: Vec<Option<usize>>,
    pipe_to_idx: Vec<Option<usize>>,

    /// Node indices at each end of each pipe, None when an end is not a
    /// member node of this system.
    edges: Vec<Option<[usize; 2]>>,
}

impl SystemIndexMap {
    /// Build the map for `system`. `None` if no entity carries that system.
    pub fn from_graph(graph: &Graph<'_>, system: &str) -> Option<Self> {
        let subgraph = graph.system(system)?;
        let node_ids = subgraph.entities.clone();
        let pipe_ids = subgraph.pipes.clone();

        let mut node_to_idx = vec![None; graph.len()];
        let mut pipe_to_idx = vec![None; graph.len()];
        for (i, id) in node_ids.iter().enumerate() {
            node_to_idx[id.slot()] = Some(i);
        }
        for (i, id) in pipe_ids.iter().enumerate() {
            pipe_to_idx[id.slot()] = Some(i);
        }

        let edges = pipe_ids
            .iter()
            .map(|&pipe| {
                let [a, b] = graph.pipe_endpoints(pipe)?;
                Some([node_to_idx[a.slot()]?, node_to_idx[b.slot()]?])
            })
            .collect();

        Some(Self {
            system: system.to_string(),
            node_ids,
            pipe_ids,
            node_to_idx,
            pipe_to_idx,
            edges,
        })
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    pub fn pipe_count(&self) -> usize {
        self.pipe_ids.len()
    }

    pub fn node_idx(&self, id: EntityId) -> Option<usize> {
        self.node_to_idx.get(id.slot()).copied().flatten()
    }

    pub fn pipe_idx(&self, id: EntityId) -> Option<usize> {
        self.pipe_to_idx.get(id.slot()).copied().flatten()
    }

    /// Get the node id for a contiguous index (panics if out of bounds).
    pub fn node_id(&self, i: usize) -> EntityId {
        self.node_ids[i]
    }

    /// Get the pipe id for a contiguous index (panics if out of bounds).
    pub fn pipe_id(&self, i: usize) -> EntityId {
        self.pipe_ids[i]
    }

    pub fn node_ids(&self) -> &[EntityId] {
        &self.node_ids
    }

    pub fn pipe_ids(&self) -> &[EntityId] {
        &self.pipe_ids
    }

    /// Node indices joined by the pipe at contiguous index `i`.
    pub fn pipe_nodes(&self, i: usize) -> Option<[usize; 2]> {
        self.edges.get(i).copied().flatten()
    }
}
