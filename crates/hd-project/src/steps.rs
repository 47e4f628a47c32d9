//! Builtin schema history.
//!
//! Each step is pure and idempotent: it only fills in what is missing, so
//! applying it to its own output changes nothing.

use std::collections::HashSet;

use hd_core::systems::{self, SEWER_DRAINAGE};
use hd_document::raw::{Object, entity_type, entity_uid};
use hd_document::{FlowSystem, RawDrawing};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::migrate::{MigrationStep, StepContext, StepFailure};

/// Namespace for ids synthesised by migrations, so re-running a migration on
/// the same input yields the same uids.
const MIGRATION_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_52c4_0d7e_4a55_9f3a_2c8e_71d4_b0a9);

/// Fixture spacing assumed when a fixture does not record one.
const DEFAULT_PIPE_DISTANCE_MM: f64 = 100.0;

pub fn builtin_steps() -> Vec<MigrationStep> {
    vec![
        MigrationStep {
            from: 0,
            name: "introduce_shared_pool",
            apply: introduce_shared_pool,
        },
        MigrationStep {
            from: 1,
            name: "order_rough_ins",
            apply: order_rough_ins,
        },
        MigrationStep {
            from: 2,
            name: "default_units",
            apply: default_units,
        },
        MigrationStep {
            from: 3,
            name: "split_flow_source_pressure",
            apply: split_flow_source_pressure,
        },
        MigrationStep {
            from: 4,
            name: "default_catalog_and_prices",
            apply: default_catalog_and_prices,
        },
        MigrationStep {
            from: 5,
            name: "add_gas_system",
            apply: add_gas_system,
        },
        MigrationStep {
            from: 6,
            name: "add_drainage",
            apply: add_drainage,
        },
        MigrationStep {
            from: 7,
            name: "entity_names",
            apply: entity_names,
        },
        MigrationStep {
            from: 8,
            name: "vent_riser_bottoms",
            apply: vent_riser_bottoms,
        },
    ]
}

fn fill(object: &mut Object, key: &str, value: Value) {
    object.entry(key.to_string()).or_insert(value);
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, StepFailure> {
    serde_json::to_value(value).map_err(|e| StepFailure::new(e.to_string()))
}

/// Move level risers into a shared pool, creating it and the other top-level
/// containers when missing.
fn introduce_shared_pool(
    mut raw: RawDrawing,
    _ctx: &StepContext<'_>,
) -> Result<RawDrawing, StepFailure> {
    for key in ["metadata", "levels", "shared"] {
        if raw.object_mut(key).is_none() {
            return Err(StepFailure::new(format!("`{key}` must be an object")));
        }
    }

    let mut moved: Vec<(String, Value)> = Vec::new();
    for (_, entities) in raw.level_containers_mut() {
        let risers: Vec<String> = entities
            .iter()
            .filter(|(_, e)| e.as_object().and_then(entity_type) == Some("RISER"))
            .map(|(key, _)| key.clone())
            .collect();
        for key in risers {
            if let Some(riser) = entities.remove(&key) {
                moved.push((key, riser));
            }
        }
    }

    let shared = raw
        .object_mut("shared")
        .ok_or_else(|| StepFailure::new("`shared` must be an object"))?;
    for (key, riser) in moved {
        if shared.contains_key(&key) {
            return Err(StepFailure::on_entity(
                key,
                "riser uid already used in the shared pool",
            ));
        }
        shared.insert(key, riser);
    }
    Ok(raw)
}

/// Give every fixture a rough-in traversal order covering exactly its
/// rough-ins. Existing orders keep their relative order.
fn order_rough_ins(mut raw: RawDrawing, _ctx: &StepContext<'_>) -> Result<RawDrawing, StepFailure> {
    for fixture in raw.level_entities_mut() {
        if entity_type(fixture) != Some("FIXTURE") {
            continue;
        }
        let uid = entity_uid(fixture).unwrap_or_default().to_string();

        let keys: Vec<String> = match fixture.get("roughIns") {
            Some(Value::Object(rough_ins)) => rough_ins.keys().cloned().collect(),
            None | Some(Value::Null) => {
                fixture.insert("roughIns".to_string(), json!({}));
                Vec::new()
            }
            Some(_) => return Err(StepFailure::on_entity(uid, "roughIns must be an object")),
        };

        let existing: Vec<String> = fixture
            .get("roughInsInOrder")
            .and_then(Value::as_array)
            .map(|order| {
                order
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut order: Vec<String> = Vec::with_capacity(keys.len());
        for system in existing {
            if keys.contains(&system) && !order.contains(&system) {
                order.push(system);
            }
        }
        let missing = keys
            .iter()
            .filter(|k| !order.contains(*k))
            .map(String::as_str);
        let appended = systems::canonical_rough_in_order(missing);
        order.extend(appended);

        fixture.insert("roughInsInOrder".to_string(), json!(order));
    }
    Ok(raw)
}

/// Fill measurement systems from the locale defaults.
fn default_units(mut raw: RawDrawing, ctx: &StepContext<'_>) -> Result<RawDrawing, StepFailure> {
    let metadata = raw
        .metadata_mut()
        .ok_or_else(|| StepFailure::new("`metadata` must be an object"))?;

    let has_units = metadata.get("units").is_some_and(Value::is_object);
    let Some(defaults) = &ctx.defaults.units else {
        if has_units {
            return Ok(raw);
        }
        return Err(StepFailure::new(format!(
            "no default units for locale {}",
            ctx.locale
        )));
    };

    let Value::Object(defaults) = to_value(defaults)? else {
        return Err(StepFailure::new("default units are not an object"));
    };
    let units = metadata
        .entry("units".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if units.is_null() {
        *units = Value::Object(Map::new());
    }
    let Some(units) = units.as_object_mut() else {
        return Err(StepFailure::new("`metadata.units` must be an object"));
    };
    for (key, value) in defaults {
        fill(units, &key, value);
    }
    Ok(raw)
}

/// Flow sources used to carry one `pressureKPA`; it becomes a min/max pair.
fn split_flow_source_pressure(
    mut raw: RawDrawing,
    _ctx: &StepContext<'_>,
) -> Result<RawDrawing, StepFailure> {
    for source in raw.level_entities_mut() {
        if entity_type(source) != Some("FLOW_SOURCE") {
            continue;
        }
        let pressure = source.remove("pressureKPA").unwrap_or(Value::Null);
        fill(source, "minPressureKPA", pressure.clone());
        fill(source, "maxPressureKPA", pressure);
    }
    Ok(raw)
}

/// Fill catalog and price table from the locale defaults.
fn default_catalog_and_prices(
    mut raw: RawDrawing,
    ctx: &StepContext<'_>,
) -> Result<RawDrawing, StepFailure> {
    let catalog = ctx.defaults.catalog.clone().unwrap_or_default();
    let price_table = ctx.defaults.price_table.clone().unwrap_or_default();

    let metadata = raw
        .metadata_mut()
        .ok_or_else(|| StepFailure::new("`metadata` must be an object"))?;
    for (key, default) in [("catalog", catalog), ("priceTable", price_table)] {
        let slot = metadata.entry(key.to_string()).or_insert(Value::Null);
        if slot.is_null() {
            *slot = Value::Object(default);
        }
    }
    fill(metadata, "calculationParams", json!({}));
    fill(metadata, "availableFixtures", json!([]));
    Ok(raw)
}

/// Append default flow systems named in `uids` that the drawing lacks.
fn merge_flow_systems<'a>(
    raw: &mut RawDrawing,
    ctx: &StepContext<'_>,
    uids: impl Iterator<Item = &'a str>,
) -> Result<(), StepFailure> {
    let wanted: Vec<&FlowSystem> = uids.filter_map(|uid| ctx.defaults.flow_system(uid)).collect();
    let metadata = raw
        .metadata_mut()
        .ok_or_else(|| StepFailure::new("`metadata` must be an object"))?;
    let systems = metadata
        .entry("flowSystems".to_string())
        .or_insert_with(|| json!([]));
    if systems.is_null() {
        *systems = json!([]);
    }
    let Some(systems) = systems.as_array_mut() else {
        return Err(StepFailure::new("`metadata.flowSystems` must be a list"));
    };

    let present: HashSet<String> = systems
        .iter()
        .filter_map(|s| s.get("uid").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    for system in wanted {
        if !present.contains(&system.uid) {
            systems.push(to_value(system)?);
        }
    }
    Ok(())
}

fn has_flow_system(raw: &RawDrawing, uid: &str) -> bool {
    raw.metadata()
        .and_then(|m| m.get("flowSystems"))
        .and_then(Value::as_array)
        .is_some_and(|systems| {
            systems
                .iter()
                .any(|s| s.get("uid").and_then(Value::as_str) == Some(uid))
        })
}

/// Gas service: default gas system and gas fields on load nodes.
fn add_gas_system(mut raw: RawDrawing, ctx: &StepContext<'_>) -> Result<RawDrawing, StepFailure> {
    merge_flow_systems(&mut raw, ctx, [systems::GAS].into_iter())?;

    for load in raw.level_entities_mut() {
        if entity_type(load) != Some("LOAD_NODE") {
            continue;
        }
        if let Some(node) = load.get_mut("node").and_then(Value::as_object_mut) {
            fill(node, "gasFlowRateMJH", json!(0));
            fill(node, "gasPressureKPA", json!(0));
        }
    }
    Ok(raw)
}

/// Uid of the drainage node synthesised for a fixture.
pub fn drainage_node_uid(fixture_uid: &str) -> String {
    let name = format!("{fixture_uid}/{SEWER_DRAINAGE}");
    Uuid::new_v5(&MIGRATION_NAMESPACE, name.as_bytes()).to_string()
}

/// Drainage service: drainage systems, vent flags on risers, and a sewer
/// rough-in with its own node on every fixture.
fn add_drainage(mut raw: RawDrawing, ctx: &StepContext<'_>) -> Result<RawDrawing, StepFailure> {
    merge_flow_systems(&mut raw, ctx, systems::DRAINAGE_SYSTEMS.into_iter())?;
    let have_sewer = has_flow_system(&raw, SEWER_DRAINAGE);

    for riser in raw.all_entities_mut() {
        if entity_type(riser) == Some("RISER") {
            fill(riser, "isVent", json!(false));
        }
    }

    for (_, entities) in raw.level_containers_mut() {
        let pending: Vec<(String, String, f64)> = entities
            .iter()
            .filter_map(|(key, e)| {
                let fixture = e.as_object()?;
                if entity_type(fixture) != Some("FIXTURE") {
                    return None;
                }
                let drained = fixture
                    .get("roughIns")
                    .and_then(Value::as_object)
                    .is_some_and(|r| r.contains_key(SEWER_DRAINAGE));
                if drained {
                    return None;
                }
                let distance = fixture
                    .get("pipeDistanceMM")
                    .and_then(Value::as_f64)
                    .unwrap_or(DEFAULT_PIPE_DISTANCE_MM);
                Some((key.clone(), entity_uid(fixture)?.to_string(), distance))
            })
            .collect();

        for (key, uid, distance) in pending {
            if !have_sewer {
                return Err(StepFailure::on_entity(
                    uid,
                    "no sewer-drainage flow system to attach the fixture to",
                ));
            }
            let node_uid = drainage_node_uid(&uid);
            if entities.contains_key(&node_uid) {
                return Err(StepFailure::on_entity(
                    uid,
                    format!("drainage node {node_uid} already exists"),
                ));
            }

            let Some(fixture) = entities.get_mut(&key).and_then(Value::as_object_mut) else {
                continue;
            };
            let Some(rough_ins) = fixture.get_mut("roughIns").and_then(Value::as_object_mut) else {
                return Err(StepFailure::on_entity(uid, "roughIns must be an object"));
            };
            rough_ins.insert(
                SEWER_DRAINAGE.to_string(),
                json!({
                    "uid": node_uid,
                    "allowAllSystems": false,
                    "continuousFlowLS": null,
                    "designFlowRateLS": null,
                    "loadingUnits": null,
                    "minPressureKPA": null,
                    "maxPressureKPA": null,
                }),
            );
            match fixture.get_mut("roughInsInOrder").and_then(Value::as_array_mut) {
                Some(order) => order.insert(0, json!(SEWER_DRAINAGE)),
                None => {
                    fixture.insert("roughInsInOrder".to_string(), json!([SEWER_DRAINAGE]));
                }
            }

            entities.insert(
                node_uid.clone(),
                json!({
                    "type": "SYSTEM_NODE",
                    "uid": node_uid,
                    "parentUid": uid,
                    "systemUid": SEWER_DRAINAGE,
                    "allowAllSystems": false,
                    "calculationHeightM": null,
                    "configuration": "INPUT",
                    "center": { "x": 0.0, "y": 0.0 - distance / 5.0 },
                }),
            );
        }
    }

    for entity in raw.level_entities_mut() {
        let is_load_node = entity_type(entity) == Some("LOAD_NODE");
        let units = if entity_type(entity) == Some("FIXTURE") {
            Some(entity)
        } else if is_load_node {
            entity.get_mut("node").and_then(Value::as_object_mut)
        } else {
            None
        };
        if let Some(units) = units {
            for key in ["upcFixtureUnits", "asnzFixtureUnits", "enDischargeUnits"] {
                fill(units, key, Value::Null);
            }
        }
    }
    Ok(raw)
}

const NAMED_KINDS: [&str; 7] = [
    "FLOW_SOURCE",
    "PIPE",
    "BIG_VALVE",
    "DIRECTED_VALVE",
    "FIXTURE",
    "FITTING",
    "RISER",
];

/// User-facing names, unset by default.
fn entity_names(mut raw: RawDrawing, _ctx: &StepContext<'_>) -> Result<RawDrawing, StepFailure> {
    for entity in raw.all_entities_mut() {
        if entity_type(entity).is_some_and(|t| NAMED_KINDS.contains(&t)) {
            fill(entity, "entityName", Value::Null);
        }
    }
    Ok(raw)
}

/// Vent risers without a bottom start at the lowest level that connects a
/// pipe to them, unless that level is above the riser's top.
fn vent_riser_bottoms(
    mut raw: RawDrawing,
    _ctx: &StepContext<'_>,
) -> Result<RawDrawing, StepFailure> {
    let mut levels: Vec<(f64, HashSet<String>)> = raw
        .levels()
        .into_iter()
        .map(|(_, level)| {
            let height = level.get("floorHeightM").and_then(Value::as_f64).unwrap_or(0.0);
            let connected = level
                .get("entities")
                .and_then(Value::as_object)
                .into_iter()
                .flat_map(|entities| entities.values())
                .filter_map(Value::as_object)
                .filter(|e| entity_type(e) == Some("PIPE"))
                .filter_map(|pipe| pipe.get("endpointUid").and_then(Value::as_array))
                .flatten()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            (height, connected)
        })
        .collect();
    levels.sort_by(|a, b| a.0.total_cmp(&b.0));

    for riser in raw.shared_entities_mut() {
        if entity_type(riser) != Some("RISER") {
            continue;
        }
        fill(riser, "bottomHeightM", Value::Null);
        fill(riser, "topHeightM", Value::Null);

        let is_vent = riser.get("isVent").and_then(Value::as_bool).unwrap_or(false);
        let unset = riser.get("bottomHeightM").is_some_and(Value::is_null);
        if !is_vent || !unset {
            continue;
        }
        let Some(uid) = entity_uid(riser).map(str::to_string) else {
            continue;
        };
        let top = riser.get("topHeightM").and_then(Value::as_f64);
        let lowest = levels
            .iter()
            .find(|(_, connected)| connected.contains(&uid))
            .map(|(height, _)| *height);
        if let Some(height) = lowest
            && top.is_none_or(|top| height <= top)
        {
            riser.insert("bottomHeightM".to_string(), json!(height));
        }
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::PartialMetadata;
    use hd_core::Locale;

    fn ctx(defaults: &PartialMetadata) -> StepContext<'_> {
        StepContext {
            locale: Locale::Australia,
            defaults,
        }
    }

    fn raw(value: Value) -> RawDrawing {
        RawDrawing::from_value(value).unwrap()
    }

    fn flow_system(uid: &str) -> FlowSystem {
        serde_json::from_value(json!({
            "uid": uid, "name": uid, "fluid": "water", "temperature": 20,
            "networks": { "RISERS": {}, "RETICULATIONS": {}, "CONNECTIONS": {} }
        }))
        .unwrap()
    }

    fn apply_twice(step: crate::migrate::StepFn, input: Value, defaults: &PartialMetadata) -> Value {
        let once = step(raw(input), &ctx(defaults)).unwrap();
        let twice = step(once.clone(), &ctx(defaults)).unwrap();
        assert_eq!(once, twice, "step is not idempotent");
        once.into_value()
    }

    #[test]
    fn risers_move_to_shared_pool() {
        let out = apply_twice(
            introduce_shared_pool,
            json!({
                "levels": {
                    "g": { "entities": {
                        "r": { "type": "RISER", "uid": "r" },
                        "f": { "type": "FITTING", "uid": "f" }
                    } }
                }
            }),
            &PartialMetadata::default(),
        );
        assert!(out["levels"]["g"]["entities"].get("r").is_none());
        assert_eq!(out["shared"]["r"]["uid"], "r");
        assert_eq!(out["metadata"], json!({}));
    }

    #[test]
    fn rough_in_order_repairs_and_derives() {
        let out = apply_twice(
            order_rough_ins,
            json!({
                "levels": { "g": { "entities": {
                    "a": {
                        "type": "FIXTURE", "uid": "a",
                        "roughIns": { "cold-water": {}, "hot-water": {}, "gas": {} }
                    },
                    "b": {
                        "type": "FIXTURE", "uid": "b",
                        "roughIns": { "cold-water": {}, "hot-water": {} },
                        "roughInsInOrder": ["cold-water", "ghost", "cold-water"]
                    }
                } } }
            }),
            &PartialMetadata::default(),
        );
        let entities = &out["levels"]["g"]["entities"];
        assert_eq!(
            entities["a"]["roughInsInOrder"],
            json!(["hot-water", "cold-water", "gas"])
        );
        assert_eq!(
            entities["b"]["roughInsInOrder"],
            json!(["cold-water", "hot-water"])
        );
    }

    #[test]
    fn flow_source_pressure_is_split() {
        let out = apply_twice(
            split_flow_source_pressure,
            json!({
                "levels": { "g": { "entities": {
                    "s": { "type": "FLOW_SOURCE", "uid": "s", "pressureKPA": 500 },
                    "t": { "type": "FLOW_SOURCE", "uid": "t" }
                } } }
            }),
            &PartialMetadata::default(),
        );
        let entities = &out["levels"]["g"]["entities"];
        assert_eq!(entities["s"]["minPressureKPA"], 500);
        assert_eq!(entities["s"]["maxPressureKPA"], 500);
        assert!(entities["s"].get("pressureKPA").is_none());
        assert_eq!(entities["t"]["minPressureKPA"], Value::Null);
    }

    #[test]
    fn default_units_require_a_source() {
        let err = default_units(raw(json!({ "metadata": {} })), &ctx(&PartialMetadata::default()))
            .unwrap_err();
        assert!(err.reason.contains("no default units"));
    }

    #[test]
    fn drainage_node_is_deterministic() {
        assert_eq!(drainage_node_uid("fx"), drainage_node_uid("fx"));
        assert_ne!(drainage_node_uid("fx"), drainage_node_uid("fy"));
    }

    #[test]
    fn drainage_added_to_fixtures() {
        let defaults = PartialMetadata {
            flow_systems: vec![flow_system(SEWER_DRAINAGE), flow_system("gas")],
            ..PartialMetadata::default()
        };
        let out = apply_twice(
            add_drainage,
            json!({
                "metadata": { "flowSystems": [] },
                "levels": { "g": { "entities": {
                    "fx": {
                        "type": "FIXTURE", "uid": "fx", "pipeDistanceMM": 50,
                        "roughIns": { "cold-water": { "uid": "fx-cw" } },
                        "roughInsInOrder": ["cold-water"]
                    }
                } } },
                "shared": { "r": { "type": "RISER", "uid": "r" } }
            }),
            &defaults,
        );

        let node_uid = drainage_node_uid("fx");
        let entities = &out["levels"]["g"]["entities"];
        assert_eq!(
            entities["fx"]["roughInsInOrder"],
            json!([SEWER_DRAINAGE, "cold-water"])
        );
        assert_eq!(entities["fx"]["roughIns"][SEWER_DRAINAGE]["uid"], node_uid);
        assert_eq!(entities["fx"]["upcFixtureUnits"], Value::Null);
        assert_eq!(entities[&node_uid]["parentUid"], "fx");
        assert_eq!(entities[&node_uid]["center"]["y"], json!(-10.0));
        assert_eq!(out["shared"]["r"]["isVent"], false);

        let systems = out["metadata"]["flowSystems"].as_array().unwrap();
        assert_eq!(systems.len(), 1);
        assert_eq!(systems[0]["uid"], SEWER_DRAINAGE);
    }

    #[test]
    fn drainage_without_sewer_system_fails_on_fixture() {
        let err = add_drainage(
            raw(json!({
                "metadata": { "flowSystems": [] },
                "levels": { "g": { "entities": {
                    "fx": { "type": "FIXTURE", "uid": "fx", "roughIns": {}, "roughInsInOrder": [] }
                } } }
            })),
            &ctx(&PartialMetadata::default()),
        )
        .unwrap_err();
        assert_eq!(err.entity.as_deref(), Some("fx"));
    }

    #[test]
    fn vent_riser_takes_lowest_connected_floor() {
        let out = apply_twice(
            vent_riser_bottoms,
            json!({
                "levels": {
                    "roof": { "floorHeightM": 9.0, "entities": {
                        "p1": { "type": "PIPE", "uid": "p1", "endpointUid": ["v", "x"] }
                    } },
                    "l1": { "floorHeightM": 3.0, "entities": {
                        "p2": { "type": "PIPE", "uid": "p2", "endpointUid": ["y", "v"] }
                    } },
                    "g": { "floorHeightM": 0.0, "entities": {} }
                },
                "shared": {
                    "v": { "type": "RISER", "uid": "v", "isVent": true, "bottomHeightM": null },
                    "w": { "type": "RISER", "uid": "w", "isVent": false }
                }
            }),
            &PartialMetadata::default(),
        );
        assert_eq!(out["shared"]["v"]["bottomHeightM"], json!(3.0));
        assert_eq!(out["shared"]["w"]["bottomHeightM"], Value::Null);
    }

    #[test]
    fn vent_riser_bottom_never_exceeds_top() {
        let out = apply_twice(
            vent_riser_bottoms,
            json!({
                "levels": {
                    "l1": { "floorHeightM": 3.0, "entities": {
                        "p": { "type": "PIPE", "uid": "p", "endpointUid": ["x", "v"] }
                    } }
                },
                "shared": {
                    "v": {
                        "type": "RISER", "uid": "v", "isVent": true,
                        "bottomHeightM": null, "topHeightM": 2.0
                    }
                }
            }),
            &PartialMetadata::default(),
        );
        assert_eq!(out["shared"]["v"]["bottomHeightM"], Value::Null);
        assert_eq!(out["shared"]["v"]["topHeightM"], json!(2.0));
    }
}
