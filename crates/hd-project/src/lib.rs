//! hd-project: drawing migration, validation and file I/O.

pub mod defaults;
pub mod fingerprint;
pub mod migrate;
pub mod steps;
pub mod validate;

use std::path::Path;

use hd_document::{Drawing, ParseError, RawDrawing};

pub use defaults::{DefaultsProvider, FileDefaults, PartialMetadata};
pub use fingerprint::fingerprint;
pub use migrate::{
    AppliedStep, CURRENT_VERSION, MigrationError, MigrationReport, MigrationStep,
    MigrationStepError, Migrator, Registry, RegistryError, StepContext, StepFailure, StepFn,
};
pub use steps::builtin_steps;
pub use validate::{
    ValidationError, ValidationResult, Violation, ViolationKind, validate, validate_drawing,
};

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read a drawing of any supported version and bring it up to date.
pub fn load_json(path: &Path, migrator: &Migrator<'_>) -> ProjectResult<Drawing> {
    let content = std::fs::read_to_string(path)?;
    let raw = RawDrawing::from_json_str(&content)?;
    Ok(migrator.migrate(raw)?)
}

pub fn load_yaml(path: &Path, migrator: &Migrator<'_>) -> ProjectResult<Drawing> {
    let content = std::fs::read_to_string(path)?;
    let raw = RawDrawing::from_yaml_str(&content)?;
    Ok(migrator.migrate(raw)?)
}

/// Write a drawing, refusing one that does not validate.
pub fn save_json(path: &Path, drawing: &Drawing) -> ProjectResult<()> {
    validate_drawing(drawing).into_result()?;
    let content = hd_document::serialize(drawing)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn save_yaml(path: &Path, drawing: &Drawing) -> ProjectResult<()> {
    validate_drawing(drawing).into_result()?;
    let content = hd_document::serialize_yaml(drawing)?;
    std::fs::write(path, content)?;
    Ok(())
}
