mod common;

use common::*;
use hd_project::{ProjectError, fingerprint, load_json, load_yaml, save_json, save_yaml};

#[test]
fn roundtrip_json_legacy_drawing() {
    let migrator = builtin_migrator();
    let drawing = load_json(&fixture_path("legacy_v1.json"), &migrator).unwrap();

    let path = std::env::temp_dir().join("hd_project_roundtrip_legacy.json");
    save_json(&path, &drawing).unwrap();
    let loaded = load_json(&path, &migrator).unwrap();

    assert_eq!(drawing, loaded);
    assert_eq!(fingerprint(&drawing).unwrap(), fingerprint(&loaded).unwrap());
}

#[test]
fn roundtrip_yaml_legacy_drawing() {
    let migrator = builtin_migrator();
    let drawing = load_json(&fixture_path("legacy_v1.json"), &migrator).unwrap();

    let path = std::env::temp_dir().join("hd_project_roundtrip_legacy.yaml");
    save_yaml(&path, &drawing).unwrap();
    let loaded = load_yaml(&path, &migrator).unwrap();

    assert_eq!(drawing, loaded);
}

#[test]
fn invalid_drawing_is_not_saved() {
    let migrator = builtin_migrator();
    let mut drawing = load_json(&fixture_path("legacy_v1.json"), &migrator).unwrap();
    drawing.shared.clear();

    let path = std::env::temp_dir().join("hd_project_invalid.json");
    let _ = std::fs::remove_file(&path);
    let err = save_json(&path, &drawing).unwrap_err();
    assert!(matches!(err, ProjectError::Validation(_)));
    assert!(!path.exists());
}

#[test]
fn duplicate_keys_are_rejected_on_load() {
    let path = std::env::temp_dir().join("hd_project_duplicate_keys.json");
    std::fs::write(&path, r#"{ "version": 9, "version": 9 }"#).unwrap();
    let err = load_json(&path, &builtin_migrator()).unwrap_err();
    assert!(matches!(err, ProjectError::Parse(_)));
    assert!(err.to_string().contains("duplicate key `version`"));
}

#[test]
fn missing_file_is_an_io_error() {
    let path = std::env::temp_dir().join("hd_project_does_not_exist.json");
    let err = load_json(&path, &builtin_migrator()).unwrap_err();
    assert!(matches!(err, ProjectError::Io(_)));
}

#[test]
fn shipped_defaults_cover_every_locale() {
    let defaults = defaults();
    let locales: Vec<_> = defaults.locales().collect();
    assert_eq!(locales, hd_core::Locale::ALL.to_vec());
}
