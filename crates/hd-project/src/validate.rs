//! Drawing validation.
//!
//! Every check runs; nothing stops at the first problem. Checks that need a
//! reference skip it when it does not resolve, so one broken reference is
//! reported once, as an integrity violation.

use std::collections::{BTreeMap, BTreeSet};

use hd_core::to_m;
use hd_document::{Drawing, Entity, EntityKind};
use hd_graph::{Graph, ReferentialIntegrityError};

use crate::migrate::CURRENT_VERSION;

/// Longest ownership chain: sheet -> host -> node.
pub const MAX_PARENT_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViolationKind {
    DanglingReference,
    DuplicateId,
    CycleDetected,
    UnsupportedVersion,
    KeyMismatch,
    UnknownSystem,
    DuplicateSystem,
    DepthExceeded,
    OwnershipMismatch,
    RoughInOrderMismatch,
    DegeneratePipe,
    InvalidEndpoint,
    SystemMismatch,
    InvalidValveSource,
    InvertedRiser,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Violation {
    #[error(transparent)]
    Integrity(#[from] ReferentialIntegrityError),

    #[error("Unsupported version: {version} (latest is {})", CURRENT_VERSION)]
    UnsupportedVersion { version: u32 },

    #[error("Key {key} in {container} holds {uid}")]
    KeyMismatch {
        container: String,
        key: String,
        uid: String,
    },

    #[error("Entity {uid} names unknown flow system {system}")]
    UnknownSystem { uid: String, system: String },

    #[error("Flow system {system} is defined {count} times")]
    DuplicateSystem { system: String, count: usize },

    #[error("Entity {uid} is {depth} deep in its ownership chain (max {})", MAX_PARENT_DEPTH)]
    DepthExceeded { uid: String, depth: usize },

    #[error("Host {host} and node {node}: {reason}")]
    OwnershipMismatch {
        host: String,
        node: String,
        reason: String,
    },

    #[error("Fixture {uid} orders rough-ins {order:?} but has {keys:?}")]
    RoughInOrderMismatch {
        uid: String,
        order: Vec<String>,
        keys: Vec<String>,
    },

    #[error("Pipe {uid} has both ends on {endpoint}")]
    DegeneratePipe { uid: String, endpoint: String },

    #[error("Pipe {uid} ends on {endpoint}, which is a {kind}")]
    InvalidEndpoint {
        uid: String,
        endpoint: String,
        kind: EntityKind,
    },

    #[error("Pipe {uid} carries {pipe_system} but {endpoint} is on {endpoint_system}")]
    SystemMismatch {
        uid: String,
        endpoint: String,
        pipe_system: String,
        endpoint_system: String,
    },

    #[error("Valve {uid} takes flow from {source_uid}, which is not a pipe connected to it")]
    InvalidValveSource { uid: String, source_uid: String },

    #[error("Riser {uid} bottom {bottom_m} m is above its top {top_m} m")]
    InvertedRiser { uid: String, bottom_m: f64, top_m: f64 },
}

impl Violation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Violation::Integrity(ReferentialIntegrityError::DanglingReference { .. }) => {
                ViolationKind::DanglingReference
            }
            Violation::Integrity(ReferentialIntegrityError::DuplicateId { .. }) => {
                ViolationKind::DuplicateId
            }
            Violation::Integrity(ReferentialIntegrityError::CycleDetected { .. }) => {
                ViolationKind::CycleDetected
            }
            Violation::UnsupportedVersion { .. } => ViolationKind::UnsupportedVersion,
            Violation::KeyMismatch { .. } => ViolationKind::KeyMismatch,
            Violation::UnknownSystem { .. } => ViolationKind::UnknownSystem,
            Violation::DuplicateSystem { .. } => ViolationKind::DuplicateSystem,
            Violation::DepthExceeded { .. } => ViolationKind::DepthExceeded,
            Violation::OwnershipMismatch { .. } => ViolationKind::OwnershipMismatch,
            Violation::RoughInOrderMismatch { .. } => ViolationKind::RoughInOrderMismatch,
            Violation::DegeneratePipe { .. } => ViolationKind::DegeneratePipe,
            Violation::InvalidEndpoint { .. } => ViolationKind::InvalidEndpoint,
            Violation::SystemMismatch { .. } => ViolationKind::SystemMismatch,
            Violation::InvalidValveSource { .. } => ViolationKind::InvalidValveSource,
            Violation::InvertedRiser { .. } => ViolationKind::InvertedRiser,
        }
    }

    /// Number of the drawing invariant this violation breaks.
    ///
    /// 1 unique uids, 2 references resolve, 3 acyclic bounded ownership,
    /// 4 distinct pipe ends, 5 pipe systems agree, 6 supported version,
    /// 7 keys match uids, 8 known unique systems, 9 composite ownership,
    /// 10 rough-in order, 11 connectable pipe ends, 12 valve source,
    /// 13 riser span. Shared-pool membership (14) is enforced when parsing.
    pub fn invariant(&self) -> u8 {
        match self.kind() {
            ViolationKind::DuplicateId => 1,
            ViolationKind::DanglingReference => 2,
            ViolationKind::CycleDetected | ViolationKind::DepthExceeded => 3,
            ViolationKind::DegeneratePipe => 4,
            ViolationKind::SystemMismatch => 5,
            ViolationKind::UnsupportedVersion => 6,
            ViolationKind::KeyMismatch => 7,
            ViolationKind::UnknownSystem | ViolationKind::DuplicateSystem => 8,
            ViolationKind::OwnershipMismatch => 9,
            ViolationKind::RoughInOrderMismatch => 10,
            ViolationKind::InvalidEndpoint => 11,
            ViolationKind::InvalidValveSource => 12,
            ViolationKind::InvertedRiser => 13,
        }
    }

    /// Entity uids involved, most specific first.
    pub fn uids(&self) -> Vec<&str> {
        match self {
            Violation::Integrity(err) => err.uids(),
            Violation::UnsupportedVersion { .. } | Violation::DuplicateSystem { .. } => Vec::new(),
            Violation::KeyMismatch { uid, .. }
            | Violation::UnknownSystem { uid, .. }
            | Violation::DepthExceeded { uid, .. }
            | Violation::RoughInOrderMismatch { uid, .. }
            | Violation::InvertedRiser { uid, .. } => vec![uid.as_str()],
            Violation::OwnershipMismatch { host, node, .. } => vec![node.as_str(), host.as_str()],
            Violation::DegeneratePipe { uid, endpoint }
            | Violation::InvalidEndpoint { uid, endpoint, .. }
            | Violation::SystemMismatch { uid, endpoint, .. } => {
                vec![uid.as_str(), endpoint.as_str()]
            }
            Violation::InvalidValveSource { uid, source_uid } => {
                vec![uid.as_str(), source_uid.as_str()]
            }
        }
    }
}

/// Outcome of validating a drawing.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Ok,
    Violations(Vec<Violation>),
}

impl ValidationResult {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        if violations.is_empty() {
            ValidationResult::Ok
        } else {
            ValidationResult::Violations(violations)
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ValidationResult::Ok)
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            ValidationResult::Ok => &[],
            ValidationResult::Violations(v) => v,
        }
    }

    pub fn into_violations(self) -> Vec<Violation> {
        match self {
            ValidationResult::Ok => Vec::new(),
            ValidationResult::Violations(v) => v,
        }
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        match self {
            ValidationResult::Ok => Ok(()),
            ValidationResult::Violations(violations) => Err(ValidationError { violations }),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Drawing has {} violation(s): {}", .violations.len(), summarize(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

/// The first few violations joined on one line.
pub fn summarize(violations: &[Violation]) -> String {
    const SHOWN: usize = 3;
    let mut text = violations
        .iter()
        .take(SHOWN)
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    if violations.len() > SHOWN {
        text.push_str(&format!("; and {} more", violations.len() - SHOWN));
    }
    text
}

/// Validate a drawing from scratch.
pub fn validate_drawing(drawing: &Drawing) -> ValidationResult {
    let (graph, _) = hd_graph::scan(drawing);
    validate(&graph)
}

/// Validate a graph. Integrity problems skipped while building it come
/// first, then every other check.
pub fn validate(graph: &Graph<'_>) -> ValidationResult {
    ValidationResult::from_violations(check_graph(graph))
}

fn check_graph(graph: &Graph<'_>) -> Vec<Violation> {
    let drawing = graph.drawing();
    let mut out: Vec<Violation> = graph
        .issues()
        .iter()
        .cloned()
        .map(Violation::from)
        .collect();

    if drawing.version > CURRENT_VERSION {
        out.push(Violation::UnsupportedVersion {
            version: drawing.version,
        });
    }

    check_keys(drawing, &mut out);
    check_systems(drawing, &mut out);
    check_depth(graph, &mut out);
    check_ownership(graph, &mut out);
    check_rough_in_order(graph, &mut out);
    check_pipes(graph, &mut out);
    check_valve_sources(graph, &mut out);
    check_risers(graph, &mut out);
    out
}

fn check_keys(drawing: &Drawing, out: &mut Vec<Violation>) {
    for (key, level) in &drawing.levels {
        if *key != level.uid {
            out.push(Violation::KeyMismatch {
                container: "levels".to_string(),
                key: key.clone(),
                uid: level.uid.clone(),
            });
        }
    }

    for (scope, key, entity) in drawing.entities() {
        if key != entity.uid() {
            out.push(Violation::KeyMismatch {
                container: scope.to_string(),
                key: key.to_string(),
                uid: entity.uid().to_string(),
            });
        }
    }
}

fn check_systems(drawing: &Drawing, out: &mut Vec<Violation>) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for system in &drawing.metadata.flow_systems {
        *counts.entry(system.uid.as_str()).or_default() += 1;
    }
    for (system, count) in &counts {
        if *count > 1 {
            out.push(Violation::DuplicateSystem {
                system: system.to_string(),
                count: *count,
            });
        }
    }

    for (_, _, entity) in drawing.entities() {
        let named: BTreeSet<&str> = entity.named_systems().into_iter().collect();
        for system in named {
            if !counts.contains_key(system) {
                out.push(Violation::UnknownSystem {
                    uid: entity.uid().to_string(),
                    system: system.to_string(),
                });
            }
        }
    }
}

fn check_depth(graph: &Graph<'_>, out: &mut Vec<Violation>) {
    for e in graph.entities() {
        if let Some(depth) = graph.depth(e.id)
            && depth > MAX_PARENT_DEPTH
        {
            out.push(Violation::DepthExceeded {
                uid: e.uid.to_string(),
                depth,
            });
        }
    }
}

/// The system a host expects on one of its owned nodes, when it fixes one.
fn expected_node_system<'e>(host: &'e Entity, node_uid: &str) -> Option<&'e str> {
    match host {
        Entity::Fixture(f) => f
            .rough_ins
            .iter()
            .find(|(_, r)| r.uid == node_uid)
            .map(|(system, _)| system.as_str()),
        Entity::Plant(p) if p.inlet_uid == node_uid => Some(&p.inlet_system_uid),
        Entity::Plant(p) if p.outlet_uid == node_uid => Some(&p.outlet_system_uid),
        _ => None,
    }
}

fn check_ownership(graph: &Graph<'_>, out: &mut Vec<Violation>) {
    for host in graph.entities() {
        for node_uid in host.entity.owned_nodes() {
            let Some(node) = graph.lookup(node_uid) else {
                continue;
            };
            let Some(system_node) = node.entity.as_system_node() else {
                out.push(Violation::OwnershipMismatch {
                    host: host.uid.to_string(),
                    node: node_uid.to_string(),
                    reason: format!("owned uid is a {}, not a SYSTEM_NODE", node.entity.kind()),
                });
                continue;
            };
            if system_node.parent_uid != host.uid {
                out.push(Violation::OwnershipMismatch {
                    host: host.uid.to_string(),
                    node: node_uid.to_string(),
                    reason: format!("node belongs to {}", system_node.parent_uid),
                });
                continue;
            }
            if let Some(expected) = expected_node_system(host.entity, node_uid)
                && !system_node.allow_all_systems
                && system_node.system_uid != expected
            {
                out.push(Violation::OwnershipMismatch {
                    host: host.uid.to_string(),
                    node: node_uid.to_string(),
                    reason: format!(
                        "node is on {} but serves {}",
                        system_node.system_uid, expected
                    ),
                });
            }
        }
    }

    for node in graph.entities() {
        if node.entity.kind() != EntityKind::SystemNode {
            continue;
        }
        let Some(parent) = graph.parent(node.id).and_then(|p| graph.entity(p)) else {
            continue;
        };
        let listed = parent.entity.owned_nodes().contains(&node.uid);
        if !parent.entity.is_composite() || !listed {
            out.push(Violation::OwnershipMismatch {
                host: parent.uid.to_string(),
                node: node.uid.to_string(),
                reason: format!("{} does not list this node", parent.entity.kind()),
            });
        }
    }
}

fn check_rough_in_order(graph: &Graph<'_>, out: &mut Vec<Violation>) {
    for e in graph.entities() {
        let Some(fixture) = e.entity.as_fixture() else {
            continue;
        };
        let mut order: Vec<&str> = fixture.rough_ins_in_order.iter().map(String::as_str).collect();
        order.sort_unstable();
        let keys: Vec<&str> = fixture.rough_ins.keys().map(String::as_str).collect();
        if order != keys {
            out.push(Violation::RoughInOrderMismatch {
                uid: e.uid.to_string(),
                order: fixture.rough_ins_in_order.clone(),
                keys: keys.into_iter().map(str::to_string).collect(),
            });
        }
    }
}

fn check_pipes(graph: &Graph<'_>, out: &mut Vec<Violation>) {
    for e in graph.entities() {
        let Some(pipe) = e.entity.as_pipe() else {
            continue;
        };
        let [a, b] = &pipe.endpoint_uid;
        if a == b {
            out.push(Violation::DegeneratePipe {
                uid: e.uid.to_string(),
                endpoint: a.clone(),
            });
            continue;
        }

        for end_uid in [a, b] {
            let Some(end) = graph.lookup(end_uid) else {
                continue;
            };
            if !end.entity.is_connectable() {
                out.push(Violation::InvalidEndpoint {
                    uid: e.uid.to_string(),
                    endpoint: end_uid.clone(),
                    kind: end.entity.kind(),
                });
                continue;
            }
            if let Some(system) = end.entity.declared_system()
                && system != pipe.system_uid
            {
                out.push(Violation::SystemMismatch {
                    uid: e.uid.to_string(),
                    endpoint: end_uid.clone(),
                    pipe_system: pipe.system_uid.clone(),
                    endpoint_system: system.to_string(),
                });
            }
        }
    }
}

fn check_valve_sources(graph: &Graph<'_>, out: &mut Vec<Violation>) {
    for e in graph.entities() {
        let Some(valve) = e.entity.as_directed_valve() else {
            continue;
        };
        let Some(source) = graph.lookup(&valve.source_uid) else {
            continue;
        };
        let incident = source
            .entity
            .as_pipe()
            .is_some_and(|pipe| pipe.connects(e.uid));
        if !incident {
            out.push(Violation::InvalidValveSource {
                uid: e.uid.to_string(),
                source_uid: valve.source_uid.clone(),
            });
        }
    }
}

fn check_risers(graph: &Graph<'_>, out: &mut Vec<Violation>) {
    for e in graph.entities() {
        let Some(riser) = e.entity.as_riser() else {
            continue;
        };
        if let (Some(bottom), Some(top)) = (riser.bottom_height(), riser.top_height())
            && bottom > top
        {
            out.push(Violation::InvertedRiser {
                uid: e.uid.to_string(),
                bottom_m: to_m(bottom),
                top_m: to_m(top),
            });
        }
    }
}
