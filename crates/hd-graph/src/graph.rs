//! Resolved drawing graph.

use std::collections::{BTreeMap, HashMap};

use hd_core::EntityId;
use hd_document::{Drawing, Entity, Level, Scope};

use crate::error::ReferentialIntegrityError;

/// An entity with its arena id and where it lives.
#[derive(Debug, Clone, Copy)]
pub struct GraphEntity<'d> {
    pub id: EntityId,
    pub uid: &'d str,
    pub scope: Scope<'d>,
    pub entity: &'d Entity,
}

/// Entities and pipes carrying one flow system.
///
/// Nodes that accept any system are members of every system one of their
/// pipes carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemSubgraph {
    /// Non-pipe members, sorted by id.
    pub entities: Vec<EntityId>,
    /// Pipes, sorted by id.
    pub pipes: Vec<EntityId>,
}

/// Id index and adjacency over one drawing.
///
/// The graph borrows the drawing and never mutates it; rebuilding from the
/// same drawing yields the same ids.
///
/// Stores:
/// - every entity of every level, then the shared pool, in key order
/// - parent -> children and entity -> incident pipes as compact offset lists
/// - per-system sub-graphs
#[derive(Debug, Clone)]
pub struct Graph<'d> {
    pub(crate) drawing: &'d Drawing,
    pub(crate) entities: Vec<GraphEntity<'d>>,
    /// First occurrence wins when a uid is duplicated.
    pub(crate) by_uid: HashMap<&'d str, EntityId>,
    pub(crate) parents: Vec<Option<EntityId>>,

    /// Entity i's children are in children[child_offsets[i]..child_offsets[i+1]].
    pub(crate) child_offsets: Vec<usize>,
    pub(crate) children: Vec<EntityId>,

    /// Entity i's pipes are in incident_pipes[pipe_offsets[i]..pipe_offsets[i+1]].
    pub(crate) pipe_offsets: Vec<usize>,
    pub(crate) incident_pipes: Vec<EntityId>,

    /// Resolved endpoints, set only for pipes whose endpoints both exist.
    pub(crate) endpoints: Vec<Option<[EntityId; 2]>>,
    pub(crate) in_cycle: Vec<bool>,
    pub(crate) systems: BTreeMap<&'d str, SystemSubgraph>,
    /// Integrity problems found while building, in report order.
    pub(crate) issues: Vec<ReferentialIntegrityError>,
}

impl<'d> Graph<'d> {
    pub fn drawing(&self) -> &'d Drawing {
        self.drawing
    }

    pub fn entities(&self) -> &[GraphEntity<'d>] {
        &self.entities
    }

    /// Integrity problems skipped while building. Empty for a graph from
    /// [`resolve`](crate::resolve).
    pub fn issues(&self) -> &[ReferentialIntegrityError] {
        &self.issues
    }

    pub fn is_resolved(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity(&self, id: EntityId) -> Option<&GraphEntity<'d>> {
        self.entities.get(id.slot())
    }

    pub fn id_of(&self, uid: &str) -> Option<EntityId> {
        self.by_uid.get(uid).copied()
    }

    pub fn lookup(&self, uid: &str) -> Option<&GraphEntity<'d>> {
        self.id_of(uid).and_then(|id| self.entity(id))
    }

    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self.parents.get(id.slot()).copied().flatten()
    }

    /// Entities whose `parentUid` resolves to `id`, in id order.
    pub fn children(&self, id: EntityId) -> &[EntityId] {
        Self::slice(&self.child_offsets, &self.children, id)
    }

    /// Pipes with an endpoint on `id`, in id order.
    pub fn incident_pipes(&self, id: EntityId) -> &[EntityId] {
        Self::slice(&self.pipe_offsets, &self.incident_pipes, id)
    }

    pub fn pipe_endpoints(&self, pipe: EntityId) -> Option<[EntityId; 2]> {
        self.endpoints.get(pipe.slot()).copied().flatten()
    }

    pub fn in_cycle(&self, id: EntityId) -> bool {
        self.in_cycle.get(id.slot()).copied().unwrap_or(false)
    }

    /// Length of the ownership chain ending at `id`, counting `id` itself.
    /// `None` when the chain loops.
    pub fn depth(&self, id: EntityId) -> Option<usize> {
        if self.in_cycle(id) {
            return None;
        }
        let mut depth = 1;
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if self.in_cycle(parent) {
                return None;
            }
            depth += 1;
            current = parent;
        }
        Some(depth)
    }

    /// Owners of `id`, nearest first. Stops before re-entering a cycle.
    pub fn ancestors(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if parent == id || out.contains(&parent) {
                break;
            }
            out.push(parent);
            current = parent;
        }
        out
    }

    pub fn systems(&self) -> &BTreeMap<&'d str, SystemSubgraph> {
        &self.systems
    }

    pub fn system(&self, uid: &str) -> Option<&SystemSubgraph> {
        self.systems.get(uid)
    }

    /// Levels from lowest floor to highest; ties broken by key.
    pub fn levels_by_height(&self) -> Vec<(&'d str, &'d Level)> {
        let mut levels: Vec<(&'d str, &'d Level)> = self
            .drawing
            .levels
            .iter()
            .map(|(key, level)| (key.as_str(), level))
            .collect();
        levels.sort_by(|a, b| {
            let (ha, hb) = (a.1.floor_height(), b.1.floor_height());
            ha.value
                .total_cmp(&hb.value)
                .then_with(|| a.0.cmp(b.0))
        });
        levels
    }

    fn slice<'g>(offsets: &[usize], flat: &'g [EntityId], id: EntityId) -> &'g [EntityId] {
        let idx = id.slot();
        match (offsets.get(idx), offsets.get(idx + 1)) {
            (Some(&start), Some(&end)) => &flat[start..end],
            _ => &[],
        }
    }
}
