//! Integrity checks run while building the graph.

use std::collections::{BTreeMap, HashMap};

use hd_core::EntityId;

use crate::error::ReferentialIntegrityError;
use crate::graph::GraphEntity;

/// One error per uid that occurs more than once, in uid order.
pub(crate) fn duplicate_ids(entities: &[GraphEntity<'_>]) -> Vec<ReferentialIntegrityError> {
    let mut occurrences: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for e in entities {
        occurrences.entry(e.uid).or_default().push(e.scope.to_string());
    }
    occurrences
        .into_iter()
        .filter(|(_, scopes)| scopes.len() > 1)
        .map(|(uid, scopes)| ReferentialIntegrityError::DuplicateId {
            uid: uid.to_string(),
            scopes,
        })
        .collect()
}

/// References that resolve to nothing, in entity order.
pub(crate) fn dangling_references(
    entities: &[GraphEntity<'_>],
    by_uid: &HashMap<&str, EntityId>,
) -> Vec<ReferentialIntegrityError> {
    let mut errors = Vec::new();
    for e in entities {
        for reference in e.entity.references() {
            if !by_uid.contains_key(reference.uid) {
                errors.push(ReferentialIntegrityError::DanglingReference {
                    from: e.uid.to_string(),
                    missing: reference.uid.to_string(),
                    field: reference.field,
                });
            }
        }
    }
    errors
}

/// Loops in the parent relation. Each entity has at most one parent, so
/// every walk either terminates or enters exactly one loop.
///
/// Returns one error per loop plus a per-entity membership flag.
pub(crate) fn parent_cycles(
    entities: &[GraphEntity<'_>],
    parents: &[Option<EntityId>],
) -> (Vec<ReferentialIntegrityError>, Vec<bool>) {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnPath,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; parents.len()];
    let mut in_cycle = vec![false; parents.len()];
    let mut errors = Vec::new();

    for start in 0..parents.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }

        let mut path = Vec::new();
        let mut current = Some(start);
        while let Some(idx) = current {
            match marks[idx] {
                Mark::Done => break,
                Mark::OnPath => {
                    let Some(pos) = path.iter().position(|&p| p == idx) else {
                        break;
                    };
                    let members = &path[pos..];
                    for &m in members {
                        in_cycle[m] = true;
                    }
                    errors.push(cycle_error(entities, members));
                    break;
                }
                Mark::Unvisited => {
                    marks[idx] = Mark::OnPath;
                    path.push(idx);
                    current = parents[idx].map(EntityId::slot);
                }
            }
        }

        for idx in path {
            marks[idx] = Mark::Done;
        }
    }

    (errors, in_cycle)
}

fn cycle_error(entities: &[GraphEntity<'_>], members: &[usize]) -> ReferentialIntegrityError {
    let mut uids: Vec<String> = members
        .iter()
        .map(|&m| entities[m].uid.to_string())
        .collect();
    if let Some(min) = uids
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
    {
        uids.rotate_left(min);
    }
    ReferentialIntegrityError::CycleDetected { uids }
}
