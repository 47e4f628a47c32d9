//! Typed drawing schema at the latest version.
//!
//! Fields the engine does not interpret are carried in flattened
//! `properties` maps so a parse/serialize cycle preserves them.

use std::collections::BTreeMap;

use hd_core::{Length, m};
use serde::{Deserialize, Deserializer, Serialize};

use crate::entity::{Entity, EntityKind, RiserEntity};

/// Opaque pass-through fields.
pub type Properties = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    pub version: u32,
    pub metadata: Metadata,
    pub levels: BTreeMap<String, Level>,
    /// Cross-level pool. Holds only risers.
    #[serde(default, deserialize_with = "shared_pool")]
    pub shared: BTreeMap<String, Entity>,
}

/// Where an entity lives inside a drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope<'a> {
    Level(&'a str),
    Shared,
}

impl std::fmt::Display for Scope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Level(uid) => write!(f, "level {uid}"),
            Scope::Shared => f.write_str("shared"),
        }
    }
}

impl Drawing {
    /// Every entity with its scope and container key. Levels in key order,
    /// then the shared pool.
    pub fn entities(&self) -> impl Iterator<Item = (Scope<'_>, &str, &Entity)> {
        let leveled = self.levels.iter().flat_map(|(level_uid, level)| {
            level
                .entities
                .iter()
                .map(move |(key, e)| (Scope::Level(level_uid.as_str()), key.as_str(), e))
        });
        let shared = self
            .shared
            .iter()
            .map(|(key, e)| (Scope::Shared, key.as_str(), e));
        leveled.chain(shared)
    }

    pub fn entity_count(&self) -> usize {
        self.levels.values().map(|l| l.entities.len()).sum::<usize>() + self.shared.len()
    }

    pub fn flow_system(&self, uid: &str) -> Option<&FlowSystem> {
        self.metadata.flow_systems.iter().find(|s| s.uid == uid)
    }

    pub fn shared_risers(&self) -> impl Iterator<Item = &RiserEntity> {
        self.shared.values().filter_map(Entity::as_riser)
    }
}

fn shared_pool<'de, D>(deserializer: D) -> Result<BTreeMap<String, Entity>, D::Error>
where
    D: Deserializer<'de>,
{
    let pool = BTreeMap::<String, Entity>::deserialize(deserializer)?;
    if let Some((key, entity)) = pool.iter().find(|(_, e)| e.kind() != EntityKind::Riser) {
        return Err(serde::de::Error::custom(format!(
            "shared pool holds only risers, found {} `{key}`",
            entity.kind()
        )));
    }
    Ok(pool)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub uid: String,
    pub name: String,
    pub abbreviation: String,
    pub floor_height_m: f64,
    pub entities: BTreeMap<String, Entity>,
    #[serde(flatten)]
    pub properties: Properties,
}

impl Level {
    pub fn floor_height(&self) -> Length {
        m(self.floor_height_m)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub units: UnitsParameters,
    pub flow_systems: Vec<FlowSystem>,
    #[serde(default)]
    pub calculation_params: Properties,
    #[serde(default)]
    pub available_fixtures: Vec<String>,
    pub catalog: Properties,
    pub price_table: Properties,
    #[serde(flatten)]
    pub properties: Properties,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasurementSystem {
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeMeasurementSystem {
    Metric,
    Imperial,
    Us,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VelocityMeasurementSystem {
    Metric,
    Imperial,
    AlternativeImperial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitsParameters {
    pub length_measurement_system: MeasurementSystem,
    pub volume_measurement_system: VolumeMeasurementSystem,
    pub velocity_measurement_system: VelocityMeasurementSystem,
    pub pressure_measurement_system: MeasurementSystem,
    pub temperature_measurement_system: MeasurementSystem,
    #[serde(flatten)]
    pub properties: Properties,
}

/// Pipe network class within a system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkType {
    Risers,
    Reticulations,
    Connections,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSystem {
    pub uid: String,
    pub name: String,
    pub fluid: String,
    pub temperature: f64,
    #[serde(default)]
    pub has_return_system: bool,
    #[serde(default)]
    pub return_is_insulated: bool,
    pub networks: Networks,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drainage_properties: Option<Properties>,
    #[serde(flatten)]
    pub properties: Properties,
}

/// Per-network sizing parameters. Opaque to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Networks {
    pub risers: Properties,
    pub reticulations: Properties,
    pub connections: Properties,
}
