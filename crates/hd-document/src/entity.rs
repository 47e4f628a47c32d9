//! Entity variants of a drawing.
//!
//! Only the fields the engine interprets are typed. Everything else an
//! entity carries (positions, colours, sizing inputs, calculation caches) is
//! kept verbatim in `properties` and written back unchanged.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use hd_core::{Length, m};

use crate::schema::{NetworkType, Properties};

/// Discriminant of [`Entity`], as persisted in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    BackgroundImage,
    FlowSource,
    Fitting,
    Pipe,
    DirectedValve,
    SystemNode,
    Fixture,
    Plant,
    BigValve,
    LoadNode,
    GasAppliance,
    Riser,
}

impl EntityKind {
    pub fn tag(self) -> &'static str {
        match self {
            EntityKind::BackgroundImage => "BACKGROUND_IMAGE",
            EntityKind::FlowSource => "FLOW_SOURCE",
            EntityKind::Fitting => "FITTING",
            EntityKind::Pipe => "PIPE",
            EntityKind::DirectedValve => "DIRECTED_VALVE",
            EntityKind::SystemNode => "SYSTEM_NODE",
            EntityKind::Fixture => "FIXTURE",
            EntityKind::Plant => "PLANT",
            EntityKind::BigValve => "BIG_VALVE",
            EntityKind::LoadNode => "LOAD_NODE",
            EntityKind::GasAppliance => "GAS_APPLIANCE",
            EntityKind::Riser => "RISER",
        }
    }

    /// Hosts that own one SYSTEM_NODE per connection point.
    pub fn is_composite(self) -> bool {
        matches!(
            self,
            EntityKind::Fixture
                | EntityKind::Plant
                | EntityKind::BigValve
                | EntityKind::GasAppliance
        )
    }

    /// Kinds a pipe may terminate on.
    pub fn is_connectable(self) -> bool {
        matches!(
            self,
            EntityKind::Fitting
                | EntityKind::Riser
                | EntityKind::SystemNode
                | EntityKind::DirectedValve
                | EntityKind::LoadNode
                | EntityKind::FlowSource
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Which field of an entity a cross-reference came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceField {
    Parent,
    Endpoint,
    Source,
    OwnedNode,
    LinkedTo,
}

impl fmt::Display for ReferenceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReferenceField::Parent => "parentUid",
            ReferenceField::Endpoint => "endpointUid",
            ReferenceField::Source => "sourceUid",
            ReferenceField::OwnedNode => "owned node",
            ReferenceField::LinkedTo => "linkedToUid",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference<'a> {
    pub field: ReferenceField,
    pub uid: &'a str,
}

/// A drawing entity. Closed over the persisted `type` tags; unknown tags are
/// rejected when parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Entity {
    BackgroundImage(BackgroundImageEntity),
    FlowSource(FlowSourceEntity),
    Fitting(FittingEntity),
    Pipe(PipeEntity),
    DirectedValve(DirectedValveEntity),
    SystemNode(SystemNodeEntity),
    Fixture(FixtureEntity),
    Plant(PlantEntity),
    BigValve(BigValveEntity),
    LoadNode(LoadNodeEntity),
    GasAppliance(GasApplianceEntity),
    Riser(RiserEntity),
}

/// Fields every variant has.
pub trait EntityCore {
    fn uid(&self) -> &str;
    fn parent_uid(&self) -> Option<&str>;
}

macro_rules! owned_by_optional_parent {
    ($($ty:ty),* $(,)?) => {
        $(
            impl EntityCore for $ty {
                fn uid(&self) -> &str {
                    &self.uid
                }

                fn parent_uid(&self) -> Option<&str> {
                    self.parent_uid.as_deref()
                }
            }
        )*
    };
}

owned_by_optional_parent!(
    BackgroundImageEntity,
    FlowSourceEntity,
    FittingEntity,
    DirectedValveEntity,
    FixtureEntity,
    PlantEntity,
    BigValveEntity,
    LoadNodeEntity,
    GasApplianceEntity,
    RiserEntity,
);

impl EntityCore for PipeEntity {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn parent_uid(&self) -> Option<&str> {
        None
    }
}

impl EntityCore for SystemNodeEntity {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn parent_uid(&self) -> Option<&str> {
        Some(&self.parent_uid)
    }
}

impl Entity {
    fn core(&self) -> &dyn EntityCore {
        match self {
            Entity::BackgroundImage(e) => e,
            Entity::FlowSource(e) => e,
            Entity::Fitting(e) => e,
            Entity::Pipe(e) => e,
            Entity::DirectedValve(e) => e,
            Entity::SystemNode(e) => e,
            Entity::Fixture(e) => e,
            Entity::Plant(e) => e,
            Entity::BigValve(e) => e,
            Entity::LoadNode(e) => e,
            Entity::GasAppliance(e) => e,
            Entity::Riser(e) => e,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::BackgroundImage(_) => EntityKind::BackgroundImage,
            Entity::FlowSource(_) => EntityKind::FlowSource,
            Entity::Fitting(_) => EntityKind::Fitting,
            Entity::Pipe(_) => EntityKind::Pipe,
            Entity::DirectedValve(_) => EntityKind::DirectedValve,
            Entity::SystemNode(_) => EntityKind::SystemNode,
            Entity::Fixture(_) => EntityKind::Fixture,
            Entity::Plant(_) => EntityKind::Plant,
            Entity::BigValve(_) => EntityKind::BigValve,
            Entity::LoadNode(_) => EntityKind::LoadNode,
            Entity::GasAppliance(_) => EntityKind::GasAppliance,
            Entity::Riser(_) => EntityKind::Riser,
        }
    }

    pub fn uid(&self) -> &str {
        self.core().uid()
    }

    pub fn parent_uid(&self) -> Option<&str> {
        self.core().parent_uid()
    }

    pub fn is_composite(&self) -> bool {
        self.kind().is_composite()
    }

    pub fn is_connectable(&self) -> bool {
        self.kind().is_connectable()
    }

    /// SYSTEM_NODE uids a composite host owns. Empty for other kinds.
    pub fn owned_nodes(&self) -> Vec<&str> {
        match self {
            Entity::Fixture(e) => e.rough_ins.values().map(|r| r.uid.as_str()).collect(),
            Entity::Plant(e) => {
                let mut nodes = vec![e.inlet_uid.as_str(), e.outlet_uid.as_str()];
                nodes.extend(e.plant.return_uid.as_deref());
                nodes.extend(e.plant.gas_node_uid.as_deref());
                nodes
            }
            Entity::BigValve(e) => {
                let mut nodes = vec![e.cold_rough_in_uid.as_str(), e.hot_rough_in_uid.as_str()];
                nodes.extend(e.valve.warm_output_uid.as_deref());
                nodes.extend(e.valve.cold_output_uid.as_deref());
                nodes.extend(e.valve.hot_output_uid.as_deref());
                nodes
            }
            Entity::GasAppliance(e) => vec![e.inlet_uid.as_str()],
            _ => Vec::new(),
        }
    }

    /// Every uid this entity points at, tagged with the field it came from.
    pub fn references(&self) -> Vec<Reference<'_>> {
        let mut refs = Vec::new();
        if let Some(parent) = self.parent_uid() {
            refs.push(Reference {
                field: ReferenceField::Parent,
                uid: parent,
            });
        }

        match self {
            Entity::Pipe(e) => {
                refs.extend(e.endpoint_uid.iter().map(|uid| Reference {
                    field: ReferenceField::Endpoint,
                    uid,
                }));
            }
            Entity::DirectedValve(e) => refs.push(Reference {
                field: ReferenceField::Source,
                uid: &e.source_uid,
            }),
            Entity::LoadNode(e) => {
                if let Some(linked) = e.linked_to_uid.as_deref() {
                    refs.push(Reference {
                        field: ReferenceField::LinkedTo,
                        uid: linked,
                    });
                }
            }
            _ => {}
        }

        refs.extend(self.owned_nodes().into_iter().map(|uid| Reference {
            field: ReferenceField::OwnedNode,
            uid,
        }));
        refs
    }

    /// The single flow system this entity belongs to, if it declares one.
    pub fn declared_system(&self) -> Option<&str> {
        match self {
            Entity::FlowSource(e) => Some(&e.system_uid),
            Entity::Fitting(e) => Some(&e.system_uid),
            Entity::Pipe(e) => Some(&e.system_uid),
            Entity::Riser(e) => Some(&e.system_uid),
            Entity::SystemNode(e) if !e.allow_all_systems => Some(&e.system_uid),
            Entity::DirectedValve(e) => e.system_uid_option.as_deref(),
            Entity::LoadNode(e) => e.system_uid_option.as_deref(),
            _ => None,
        }
    }

    /// Connectable entities that take on whatever system their pipes carry.
    pub fn accepts_any_system(&self) -> bool {
        match self {
            Entity::SystemNode(e) => e.allow_all_systems,
            Entity::DirectedValve(e) => e.system_uid_option.is_none(),
            Entity::LoadNode(e) => e.system_uid_option.is_none(),
            _ => false,
        }
    }

    /// Every flow-system uid this entity names, for catalogue checks.
    pub fn named_systems(&self) -> Vec<&str> {
        match self {
            Entity::SystemNode(e) => vec![e.system_uid.as_str()],
            Entity::Fixture(e) => e.rough_ins.keys().map(String::as_str).collect(),
            Entity::Plant(e) => vec![e.inlet_system_uid.as_str(), e.outlet_system_uid.as_str()],
            other => other.declared_system().into_iter().collect(),
        }
    }

    pub fn as_pipe(&self) -> Option<&PipeEntity> {
        match self {
            Entity::Pipe(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_riser(&self) -> Option<&RiserEntity> {
        match self {
            Entity::Riser(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_system_node(&self) -> Option<&SystemNodeEntity> {
        match self {
            Entity::SystemNode(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_fixture(&self) -> Option<&FixtureEntity> {
        match self {
            Entity::Fixture(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_directed_valve(&self) -> Option<&DirectedValveEntity> {
        match self {
            Entity::DirectedValve(e) => Some(e),
            _ => None,
        }
    }
}

/// A drawing sheet. Spatial entities are positioned relative to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundImageEntity {
    pub uid: String,
    #[serde(default)]
    pub parent_uid: Option<String>,
    #[serde(flatten)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSourceEntity {
    pub uid: String,
    #[serde(default)]
    pub parent_uid: Option<String>,
    pub system_uid: String,
    #[serde(flatten)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FittingEntity {
    pub uid: String,
    #[serde(default)]
    pub parent_uid: Option<String>,
    pub system_uid: String,
    #[serde(flatten)]
    pub properties: Properties,
}

/// Pipes are edges between two connectable entities, never owned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipeEntity {
    pub uid: String,
    #[serde(default)]
    pub parent_uid: NoParent,
    pub system_uid: String,
    pub network: NetworkType,
    pub endpoint_uid: [String; 2],
    #[serde(flatten)]
    pub properties: Properties,
}

impl PipeEntity {
    pub fn connects(&self, uid: &str) -> bool {
        self.endpoint_uid.iter().any(|e| e == uid)
    }
}

/// The `parentUid` of a pipe: always persisted as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoParent;

impl Serialize for NoParent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_none()
    }
}

impl<'de> Deserialize<'de> for NoParent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(NoParent),
            Some(parent) => Err(serde::de::Error::custom(format!(
                "pipe parentUid must be null, found `{parent}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectedValveEntity {
    pub uid: String,
    #[serde(default)]
    pub parent_uid: Option<String>,
    #[serde(default)]
    pub system_uid_option: Option<String>,
    /// Pipe on the upstream side.
    pub source_uid: String,
    pub valve: ValveDef,
    #[serde(flatten)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValveDef {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub properties: Properties,
}

impl ValveDef {
    /// Valves whose behaviour depends on flow direction (regulators, meters,
    /// strainers, backflow devices, pumps).
    pub fn is_directional(&self) -> bool {
        !matches!(self.kind.as_str(), "ISOLATION_VALVE" | "BALANCING")
    }
}

/// Connection point owned by a composite host, one per system it serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemNodeEntity {
    pub uid: String,
    pub parent_uid: String,
    pub system_uid: String,
    #[serde(default)]
    pub allow_all_systems: bool,
    #[serde(flatten)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureEntity {
    pub uid: String,
    #[serde(default)]
    pub parent_uid: Option<String>,
    /// Per-system engineering inputs, keyed by system uid.
    pub rough_ins: BTreeMap<String, RoughIn>,
    /// Traversal order over `rough_ins` keys.
    pub rough_ins_in_order: Vec<String>,
    #[serde(flatten)]
    pub properties: Properties,
}

impl FixtureEntity {
    /// Rough-ins in traversal order, skipping order entries with no record.
    pub fn ordered_rough_ins(&self) -> impl Iterator<Item = (&str, &RoughIn)> {
        self.rough_ins_in_order
            .iter()
            .filter_map(|system| self.rough_ins.get_key_value(system))
            .map(|(system, rough_in)| (system.as_str(), rough_in))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoughIn {
    /// The SYSTEM_NODE serving this rough-in.
    pub uid: String,
    #[serde(flatten)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantEntity {
    pub uid: String,
    #[serde(default)]
    pub parent_uid: Option<String>,
    pub inlet_system_uid: String,
    pub outlet_system_uid: String,
    pub inlet_uid: String,
    pub outlet_uid: String,
    pub plant: PlantDef,
    #[serde(flatten)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantDef {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_node_uid: Option<String>,
    #[serde(flatten)]
    pub properties: Properties,
}

/// Thermostatic mixing, tempering and hot/cold RPZD assemblies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BigValveEntity {
    pub uid: String,
    #[serde(default)]
    pub parent_uid: Option<String>,
    pub cold_rough_in_uid: String,
    pub hot_rough_in_uid: String,
    pub valve: BigValveDef,
    #[serde(flatten)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BigValveDef {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warm_output_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cold_output_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hot_output_uid: Option<String>,
    #[serde(flatten)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadNodeEntity {
    pub uid: String,
    #[serde(default)]
    pub parent_uid: Option<String>,
    #[serde(default)]
    pub system_uid_option: Option<String>,
    #[serde(default)]
    pub linked_to_uid: Option<String>,
    #[serde(flatten)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasApplianceEntity {
    pub uid: String,
    #[serde(default)]
    pub parent_uid: Option<String>,
    pub inlet_uid: String,
    #[serde(flatten)]
    pub properties: Properties,
}

/// Vertical stack. Lives in the shared pool so every level can connect to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiserEntity {
    pub uid: String,
    #[serde(default)]
    pub parent_uid: Option<String>,
    pub system_uid: String,
    pub is_vent: bool,
    #[serde(default)]
    pub bottom_height_m: Option<f64>,
    #[serde(default)]
    pub top_height_m: Option<f64>,
    #[serde(flatten)]
    pub properties: Properties,
}

impl RiserEntity {
    pub fn bottom_height(&self) -> Option<Length> {
        self.bottom_height_m.map(m)
    }

    pub fn top_height(&self) -> Option<Length> {
        self.top_height_m.map(m)
    }
}
