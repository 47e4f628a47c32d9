//! Shared builders for hd-project integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use hd_core::Locale;
use hd_document::RawDrawing;
use hd_project::{FileDefaults, Migrator, Registry};
use serde_json::{Value, json};

pub fn config_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/defaults.yaml")
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn defaults() -> Arc<FileDefaults> {
    let path = config_path();
    Arc::new(
        FileDefaults::load(&path)
            .unwrap_or_else(|e| panic!("Failed to load {}: {}", path.display(), e)),
    )
}

pub fn migrator(registry: &Registry) -> Migrator<'_> {
    Migrator::new(registry, defaults(), Locale::Australia)
}

pub fn builtin_migrator() -> Migrator<'static> {
    migrator(Registry::builtin().unwrap())
}

pub fn raw(value: Value) -> RawDrawing {
    RawDrawing::from_value(value).unwrap()
}

pub fn legacy_v1() -> RawDrawing {
    let text = std::fs::read_to_string(fixture_path("legacy_v1.json")).unwrap();
    RawDrawing::from_json_str(&text).unwrap()
}

pub fn flow_system(uid: &str, fluid: &str) -> Value {
    json!({
        "uid": uid,
        "name": uid,
        "fluid": fluid,
        "temperature": 20,
        "networks": { "RISERS": {}, "RETICULATIONS": {}, "CONNECTIONS": {} }
    })
}

pub fn level(uid: &str, height: f64, entities: Value) -> Value {
    json!({
        "uid": uid,
        "name": uid,
        "abbreviation": uid,
        "floorHeightM": height,
        "entities": entities
    })
}

/// A version 1 drawing: levels and shared pool exist, nothing newer does.
pub fn v1_drawing(levels: Value, shared: Value) -> Value {
    json!({
        "version": 1,
        "metadata": {
            "flowSystems": [
                flow_system("cold-water", "water"),
                flow_system("hot-water", "water"),
                flow_system("warm-water", "water")
            ]
        },
        "levels": levels,
        "shared": shared
    })
}

pub fn fitting(uid: &str, system: &str) -> Value {
    json!({ "type": "FITTING", "uid": uid, "parentUid": null, "systemUid": system })
}

pub fn pipe(uid: &str, system: &str, a: &str, b: &str) -> Value {
    json!({
        "type": "PIPE",
        "uid": uid,
        "parentUid": null,
        "systemUid": system,
        "network": "RETICULATIONS",
        "endpointUid": [a, b]
    })
}

pub fn system_node(uid: &str, parent: &str, system: &str) -> Value {
    json!({ "type": "SYSTEM_NODE", "uid": uid, "parentUid": parent, "systemUid": system })
}

/// A fixture with one node per rough-in system, without a rough-in order.
/// Returns the fixture and its nodes as `(key, entity)` pairs.
pub fn fixture(uid: &str, systems: &[&str]) -> Vec<(String, Value)> {
    let mut rough_ins = serde_json::Map::new();
    let mut out = Vec::new();
    for system in systems {
        let node = format!("{uid}-{system}");
        rough_ins.insert(system.to_string(), json!({ "uid": node }));
        out.push((node.clone(), system_node(&node, uid, system)));
    }
    out.insert(
        0,
        (
            uid.to_string(),
            json!({
                "type": "FIXTURE",
                "uid": uid,
                "parentUid": null,
                "pipeDistanceMM": 100,
                "roughIns": rough_ins
            }),
        ),
    );
    out
}

pub fn entities(pairs: impl IntoIterator<Item = (String, Value)>) -> Value {
    Value::Object(pairs.into_iter().collect())
}
