//! Graph construction from a parsed drawing.

use std::collections::{BTreeMap, HashMap};

use hd_core::EntityId;
use hd_document::{Drawing, Entity};

use crate::error::ReferentialIntegrityError;
use crate::graph::{Graph, GraphEntity, SystemSubgraph};
use crate::validate;

/// Builds a [`Graph`] over one drawing.
///
/// `new` indexes every entity; `scan` derives adjacency while collecting
/// every integrity problem, `build` stops at the first one.
#[derive(Debug)]
pub struct GraphBuilder<'d> {
    drawing: &'d Drawing,
    entities: Vec<GraphEntity<'d>>,
    by_uid: HashMap<&'d str, EntityId>,
}

impl<'d> GraphBuilder<'d> {
    pub fn new(drawing: &'d Drawing) -> Self {
        let mut entities = Vec::with_capacity(drawing.entity_count());
        let mut by_uid = HashMap::with_capacity(drawing.entity_count());

        for (scope, _key, entity) in drawing.entities() {
            let id = EntityId::from_index(entities.len() as u32);
            let uid = entity.uid();
            entities.push(GraphEntity {
                id,
                uid,
                scope,
                entity,
            });
            by_uid.entry(uid).or_insert(id);
        }

        Self {
            drawing,
            entities,
            by_uid,
        }
    }

    /// Build the graph, skipping broken edges, and report every problem:
    /// duplicate uids first, then dangling references, then parent cycles.
    pub fn scan(self) -> (Graph<'d>, Vec<ReferentialIntegrityError>) {
        let mut issues = validate::duplicate_ids(&self.entities);
        issues.extend(validate::dangling_references(&self.entities, &self.by_uid));

        let parents: Vec<Option<EntityId>> = self
            .entities
            .iter()
            .map(|e| e.entity.parent_uid().and_then(|p| self.by_uid.get(p).copied()))
            .collect();

        let (cycles, in_cycle) = validate::parent_cycles(&self.entities, &parents);
        issues.extend(cycles);

        let (child_offsets, children) = Self::build_adjacency(
            self.entities.len(),
            parents
                .iter()
                .enumerate()
                .filter_map(|(i, p)| p.map(|p| (p, EntityId::from_index(i as u32)))),
        );

        let endpoints: Vec<Option<[EntityId; 2]>> = self
            .entities
            .iter()
            .map(|e| {
                let pipe = e.entity.as_pipe()?;
                let a = self.by_uid.get(pipe.endpoint_uid[0].as_str())?;
                let b = self.by_uid.get(pipe.endpoint_uid[1].as_str())?;
                Some([*a, *b])
            })
            .collect();

        let incidence = self.entities.iter().flat_map(|e| {
            let pipe = e.entity.as_pipe();
            let mut ends: Vec<EntityId> = pipe
                .map(|p| {
                    p.endpoint_uid
                        .iter()
                        .filter_map(|uid| self.by_uid.get(uid.as_str()).copied())
                        .collect()
                })
                .unwrap_or_default();
            ends.dedup();
            ends.into_iter().map(move |end| (end, e.id))
        });
        let (pipe_offsets, incident_pipes) =
            Self::build_adjacency(self.entities.len(), incidence);

        let systems = Self::group_systems(&self.entities, &self.by_uid);

        let graph = Graph {
            drawing: self.drawing,
            entities: self.entities,
            by_uid: self.by_uid,
            parents,
            child_offsets,
            children,
            pipe_offsets,
            incident_pipes,
            endpoints,
            in_cycle,
            systems,
            issues: issues.clone(),
        };
        (graph, issues)
    }

    /// Build the graph, failing on the first integrity problem `scan` would
    /// report.
    pub fn build(self) -> Result<Graph<'d>, ReferentialIntegrityError> {
        let (graph, issues) = self.scan();
        match issues.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(graph),
        }
    }

    /// Compact adjacency from `(owner, member)` pairs: offsets of length
    /// `n + 1` plus a flat member list sorted by owner then member id.
    fn build_adjacency(
        n: usize,
        pairs: impl Iterator<Item = (EntityId, EntityId)>,
    ) -> (Vec<usize>, Vec<EntityId>) {
        let mut grouped: Vec<Vec<EntityId>> = vec![Vec::new(); n];
        for (owner, member) in pairs {
            if let Some(list) = grouped.get_mut(owner.slot()) {
                list.push(member);
            }
        }

        let mut offsets = Vec::with_capacity(n + 1);
        let mut flat = Vec::new();
        offsets.push(0);
        for mut list in grouped {
            list.sort();
            flat.extend(list);
            offsets.push(flat.len());
        }
        (offsets, flat)
    }

    fn group_systems(
        entities: &[GraphEntity<'d>],
        by_uid: &HashMap<&'d str, EntityId>,
    ) -> BTreeMap<&'d str, SystemSubgraph> {
        let mut systems: BTreeMap<&'d str, SystemSubgraph> = BTreeMap::new();

        for e in entities {
            match e.entity {
                Entity::Pipe(pipe) => {
                    let system = systems.entry(pipe.system_uid.as_str()).or_default();
                    system.pipes.push(e.id);
                    for end in &pipe.endpoint_uid {
                        let Some(&end_id) = by_uid.get(end.as_str()) else {
                            continue;
                        };
                        if entities[end_id.slot()].entity.accepts_any_system() {
                            system.entities.push(end_id);
                        }
                    }
                }
                entity => {
                    if let Some(system) = entity.declared_system() {
                        systems.entry(system).or_default().entities.push(e.id);
                    }
                }
            }
        }

        for system in systems.values_mut() {
            system.entities.sort();
            system.entities.dedup();
            system.pipes.sort();
        }
        systems
    }
}

/// Resolve every reference of `drawing`, failing on the first problem.
pub fn resolve(drawing: &Drawing) -> Result<Graph<'_>, ReferentialIntegrityError> {
    GraphBuilder::new(drawing).build()
}

/// Resolve what can be resolved and report every problem found.
pub fn scan(drawing: &Drawing) -> (Graph<'_>, Vec<ReferentialIntegrityError>) {
    GraphBuilder::new(drawing).scan()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacency_groups_by_owner() {
        let id = |i| EntityId::from_index(i);
        let pairs = vec![(id(2), id(1)), (id(0), id(3)), (id(2), id(0))];
        let (offsets, flat) = GraphBuilder::build_adjacency(4, pairs.into_iter());
        assert_eq!(offsets, vec![0, 1, 1, 3, 3]);
        assert_eq!(flat, vec![id(3), id(0), id(1)]);
    }
}
