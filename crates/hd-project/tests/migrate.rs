mod common;

use std::sync::Arc;

use common::*;
use hd_core::Locale;
use hd_core::systems::SEWER_DRAINAGE;
use hd_document::{Entity, MeasurementSystem, RawDrawing};
use hd_project::steps::drainage_node_uid;
use hd_project::{
    CURRENT_VERSION, DefaultsProvider, MigrationError, MigrationStep, Migrator, PartialMetadata,
    Registry, StepContext, StepFailure, StepFn, builtin_steps, fingerprint,
};
use proptest::prelude::*;
use serde_json::json;

#[test]
fn legacy_drawing_reaches_current_version() {
    let drawing = builtin_migrator().migrate(legacy_v1()).unwrap();
    assert_eq!(drawing.version, CURRENT_VERSION);

    let meta = &drawing.metadata;
    assert!(meta.flow_systems.iter().any(|s| s.uid == "gas"));
    assert!(meta.flow_systems.iter().any(|s| s.uid == SEWER_DRAINAGE));
    assert_eq!(meta.price_table.get("currency"), Some(&json!("AUD")));
    assert_eq!(meta.properties.get("generalInfo"), Some(&json!({ "title": "Amenities block" })));

    let ground = &drawing.levels["ground"];
    let Entity::FlowSource(src) = &ground.entities["src"] else {
        panic!("src is not a flow source");
    };
    assert_eq!(src.properties.get("minPressureKPA"), Some(&json!(400)));
    assert_eq!(src.properties.get("maxPressureKPA"), Some(&json!(400)));
    assert!(!src.properties.contains_key("pressureKPA"));

    let riser = drawing.shared["hw-riser"].as_riser().unwrap();
    assert!(!riser.is_vent);
    assert_eq!(riser.top_height_m, Some(6.0));
}

/// Fixtures without a rough-in order get one, deterministically.
#[test]
fn rough_in_order_is_populated() {
    let migrator = builtin_migrator();
    let first = migrator.migrate(legacy_v1()).unwrap();
    let second = migrator.migrate(legacy_v1()).unwrap();
    assert_eq!(first, second);

    let basin = first.levels["ground"].entities["basin"].as_fixture().unwrap();
    assert_eq!(
        basin.rough_ins_in_order,
        vec![SEWER_DRAINAGE, "hot-water", "cold-water"]
    );

    let node_uid = drainage_node_uid("basin");
    assert_eq!(basin.rough_ins[SEWER_DRAINAGE].uid, node_uid);
    let node = first.levels["ground"].entities[&node_uid]
        .as_system_node()
        .unwrap();
    assert_eq!(node.parent_uid, "basin");
    assert_eq!(node.system_uid, SEWER_DRAINAGE);
    assert_eq!(node.properties.get("center"), Some(&json!({ "x": 0.0, "y": -30.0 })));
}

#[test]
fn migrating_a_current_drawing_changes_nothing() {
    let migrator = builtin_migrator();
    let once = migrator.migrate(legacy_v1()).unwrap();
    let twice = migrator.migrate_drawing(&once).unwrap();
    assert_eq!(once, twice);
    assert_eq!(fingerprint(&once).unwrap(), fingerprint(&twice).unwrap());
}

#[test]
fn every_step_is_a_no_op_on_current_output() {
    let migrator = builtin_migrator();
    let drawing = migrator.migrate(legacy_v1()).unwrap();
    let current = RawDrawing::from_drawing(&drawing).unwrap();

    let defaults = defaults().metadata_defaults(migrator.locale());
    let ctx = StepContext {
        locale: migrator.locale(),
        defaults: &defaults,
    };
    for step in builtin_steps() {
        let again = (step.apply)(current.clone(), &ctx)
            .unwrap_or_else(|e| panic!("{} failed: {}", step.name, e.reason));
        assert_eq!(again, current, "{} changed a current drawing", step.name);
    }
}

#[test]
fn future_version_is_rejected() {
    let mut raw = legacy_v1();
    raw.set_version(CURRENT_VERSION + 1);
    let err = builtin_migrator().migrate(raw).unwrap_err();
    assert!(matches!(
        err,
        MigrationError::UnknownFutureVersion { found, supported }
            if found == u64::from(CURRENT_VERSION) + 1 && supported == CURRENT_VERSION
    ));
}

#[test]
fn huge_version_is_a_future_version() {
    let mut value = legacy_v1().into_value();
    value["version"] = json!(u64::MAX);
    let err = builtin_migrator().migrate(raw(value)).unwrap_err();
    assert!(matches!(
        err,
        MigrationError::UnknownFutureVersion { found: u64::MAX, supported: CURRENT_VERSION }
    ));
    assert!(err.to_string().contains("upgrade the tooling"));
}

#[test]
fn malformed_versions_are_rejected() {
    let migrator = builtin_migrator();
    for version in [json!("3"), json!(-1), json!(2.5)] {
        let mut value = legacy_v1().into_value();
        value["version"] = version;
        let err = migrator.migrate(raw(value)).unwrap_err();
        assert!(
            matches!(err, MigrationError::InvalidVersion { .. }),
            "unexpected {err}"
        );
    }
}

#[test]
fn missing_version_starts_from_zero() {
    let mut value = v1_drawing(
        json!({
            "g": level("g", 0.0, json!({
                "a": fitting("a", "cold-water"),
                "r": {
                    "type": "RISER",
                    "uid": "r",
                    "systemUid": "cold-water"
                },
                "p": pipe("p", "cold-water", "a", "r")
            }))
        }),
        json!(null),
    );
    value.as_object_mut().unwrap().remove("version");

    let drawing = builtin_migrator().migrate(raw(value)).unwrap();
    assert!(drawing.shared.contains_key("r"));
    assert!(!drawing.levels["g"].entities.contains_key("r"));
}

#[test]
fn partial_migration_stops_at_target() {
    let migrator = builtin_migrator();
    for target in 1..=CURRENT_VERSION {
        let (raw, report) = migrator.migrate_to(legacy_v1(), target).unwrap();
        assert_eq!(raw.version().unwrap(), u64::from(target));
        assert_eq!(report.to, target);
        assert_eq!(report.applied.len() as u32, target - 1);
        for (applied, from) in report.applied.iter().zip(1..) {
            assert_eq!(applied.from, from);
            assert_eq!(applied.to, from + 1);
        }
    }

    // Already past the target: untouched.
    let (current, _) = migrator.migrate_to(legacy_v1(), CURRENT_VERSION).unwrap();
    let (again, report) = migrator.migrate_to(current.clone(), 3).unwrap();
    assert_eq!(again, current);
    assert!(report.applied.is_empty());
    assert_eq!(report.to, CURRENT_VERSION);
}

#[test]
fn intermediate_versions_converge() {
    let migrator = builtin_migrator();
    let direct = migrator.migrate(legacy_v1()).unwrap();
    for stop in 2..CURRENT_VERSION {
        let (partial, _) = migrator.migrate_to(legacy_v1(), stop).unwrap();
        assert_eq!(migrator.migrate(partial).unwrap(), direct, "via version {stop}");
    }
}

fn fail_on_basin(_: RawDrawing, _: &StepContext<'_>) -> Result<RawDrawing, StepFailure> {
    Err(StepFailure::on_entity("basin", "cannot drain"))
}

fn add_dangling_pipe(mut raw: RawDrawing, _: &StepContext<'_>) -> Result<RawDrawing, StepFailure> {
    if let Some((_, entities)) = raw.level_containers_mut().into_iter().next() {
        entities.insert("bad".into(), pipe("bad", "cold-water", "tee", "nowhere"));
    }
    Ok(raw)
}

fn with_step(from: u32, apply: StepFn) -> Registry {
    let steps: Vec<MigrationStep> = builtin_steps()
        .into_iter()
        .map(|s| if s.from == from { MigrationStep { apply, ..s } } else { s })
        .collect();
    Registry::new(steps, CURRENT_VERSION).unwrap()
}

#[test]
fn step_failure_names_step_and_entity() {
    let registry = with_step(6, fail_on_basin);
    let err = migrator(&registry).migrate(legacy_v1()).unwrap_err();
    let MigrationError::Step(step) = &err else {
        panic!("unexpected {err}");
    };
    assert_eq!(step.step, 6);
    assert_eq!(step.name, "add_drainage");
    assert_eq!(step.entity.as_deref(), Some("basin"));
    assert!(err.to_string().contains("cannot drain"));
}

#[test]
fn broken_step_output_is_caught() {
    let registry = with_step(8, add_dangling_pipe);
    let err = migrator(&registry).migrate(legacy_v1()).unwrap_err();
    let MigrationError::PostMigrationIntegrity { from, violations } = err else {
        panic!("expected post-migration integrity failure");
    };
    assert_eq!(from, 1);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].uids(), vec!["bad", "nowhere"]);
}

#[test]
fn invalid_current_drawing_is_reported_as_such() {
    let migrator = builtin_migrator();
    let drawing = migrator.migrate(legacy_v1()).unwrap();
    let mut value = RawDrawing::from_drawing(&drawing).unwrap().into_value();
    value["levels"]["ground"]["entities"]["p1"]["endpointUid"] = json!(["src", "ghost"]);

    let err = migrator.migrate(raw(value)).unwrap_err();
    assert!(matches!(err, MigrationError::InvalidDocument { ref violations } if violations.len() == 1));
}

#[test]
fn fixture_without_sewer_system_fails_migration() {
    let registry = Registry::builtin().unwrap();
    let no_systems = PartialMetadata {
        units: defaults().metadata_defaults(Locale::Australia).units,
        ..PartialMetadata::default()
    };
    let migrator = Migrator::new(registry, Arc::new(no_systems), Locale::Australia);
    let err = migrator.migrate(legacy_v1()).unwrap_err();
    assert!(matches!(
        err,
        MigrationError::Step(ref s) if s.step == 6 && s.entity.as_deref() == Some("basin")
    ));
}

#[test]
fn migrate_all_keeps_input_order() {
    let mut future = legacy_v1();
    future.set_version(CURRENT_VERSION + 4);
    let results = builtin_migrator().migrate_all(vec![legacy_v1(), future, legacy_v1()]);
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(MigrationError::UnknownFutureVersion { .. })));
    assert!(results[2].is_ok());
}

#[test]
fn other_locales_use_their_defaults() {
    let registry = Registry::builtin().unwrap();
    let migrator = Migrator::new(registry, defaults(), Locale::UnitedStates);
    let drawing = migrator.migrate(legacy_v1()).unwrap();
    assert_eq!(drawing.metadata.price_table.get("currency"), Some(&json!("USD")));
    assert_eq!(
        drawing.metadata.units.length_measurement_system,
        MeasurementSystem::Imperial
    );
}

const SYSTEMS: [&str; 3] = ["cold-water", "hot-water", "warm-water"];

proptest! {
    #[test]
    fn migration_is_idempotent_for_any_fixture_mix(
        picks in prop::collection::vec(prop::sample::subsequence(SYSTEMS.to_vec(), 0..=3), 1..4)
    ) {
        let mut pairs = Vec::new();
        for (i, systems) in picks.iter().enumerate() {
            pairs.extend(fixture(&format!("fx{i}"), systems));
        }
        let value = v1_drawing(json!({ "g": level("g", 0.0, entities(pairs)) }), json!({}));

        let migrator = builtin_migrator();
        let once = migrator.migrate(raw(value)).unwrap();
        let twice = migrator.migrate_drawing(&once).unwrap();
        prop_assert_eq!(fingerprint(&once).unwrap(), fingerprint(&twice).unwrap());

        for (i, systems) in picks.iter().enumerate() {
            let fx = once.levels["g"].entities[&format!("fx{i}")].as_fixture().unwrap();
            prop_assert_eq!(fx.rough_ins_in_order.first().map(String::as_str), Some(SEWER_DRAINAGE));
            prop_assert_eq!(fx.rough_ins_in_order.len(), systems.len() + 1);
        }
    }
}
