//! Schema migration framework.
//!
//! A drawing persisted at version `v` is upgraded by applying registered
//! steps `v, v+1, ..` up to the registry's target, stamping the version
//! after each one. The result is parsed, resolved and validated before it is
//! handed back.

use std::sync::{Arc, OnceLock};

use hd_core::Locale;
use hd_document::{Drawing, ParseError, RawDrawing};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::defaults::{DefaultsProvider, PartialMetadata};
use crate::steps;
use crate::validate::{ValidationResult, Violation, summarize, validate_drawing};

pub const CURRENT_VERSION: u32 = 9;

/// What a step sees besides the drawing.
#[derive(Debug, Clone)]
pub struct StepContext<'a> {
    pub locale: Locale,
    pub defaults: &'a PartialMetadata,
}

/// Why a step gave up, optionally naming the entity it choked on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub entity: Option<String>,
    pub reason: String,
}

impl StepFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            entity: None,
            reason: reason.into(),
        }
    }

    pub fn on_entity(uid: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            entity: Some(uid.into()),
            reason: reason.into(),
        }
    }
}

pub type StepFn = fn(RawDrawing, &StepContext<'_>) -> Result<RawDrawing, StepFailure>;

/// Upgrade from version `from` to `from + 1`.
#[derive(Debug, Clone, Copy)]
pub struct MigrationStep {
    pub from: u32,
    pub name: &'static str,
    pub apply: StepFn,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No migration step starts at version {from}")]
    Gap { from: u32 },

    #[error("Steps {first} and {second} both start at version {from}")]
    Duplicate {
        from: u32,
        first: &'static str,
        second: &'static str,
    },

    #[error("Step {name} starts at version {from}, outside 0..{target}")]
    OutOfRange {
        from: u32,
        name: &'static str,
        target: u32,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Migration step {step} ({name}) failed{}: {reason}", on_entity(.entity))]
pub struct MigrationStepError {
    pub step: u32,
    pub name: &'static str,
    pub entity: Option<String>,
    pub reason: String,
}

fn on_entity(entity: &Option<String>) -> String {
    entity
        .as_ref()
        .map(|uid| format!(" on {uid}"))
        .unwrap_or_default()
}

#[derive(thiserror::Error, Debug)]
pub enum MigrationError {
    #[error(
        "Drawing version {found} is newer than this tool supports ({supported}); upgrade the tooling"
    )]
    UnknownFutureVersion { found: u64, supported: u32 },

    #[error("Invalid drawing version: {found}")]
    InvalidVersion { found: String },

    #[error("Migration registry is inconsistent: {0}")]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Step(#[from] MigrationStepError),

    #[error("Drawing does not match the schema: {0}")]
    Parse(#[from] ParseError),

    #[error("Drawing migrated from version {from} fails validation: {}", summarize(.violations))]
    PostMigrationIntegrity { from: u32, violations: Vec<Violation> },

    #[error("Drawing fails validation: {}", summarize(.violations))]
    InvalidDocument { violations: Vec<Violation> },
}

/// Dense, self-checked list of steps `0..target`.
#[derive(Debug, Clone)]
pub struct Registry {
    steps: Vec<MigrationStep>,
    target: u32,
}

impl Registry {
    pub fn new(mut steps: Vec<MigrationStep>, target: u32) -> Result<Self, RegistryError> {
        steps.sort_by_key(|s| s.from);

        if let Some(step) = steps.iter().find(|s| s.from >= target) {
            return Err(RegistryError::OutOfRange {
                from: step.from,
                name: step.name,
                target,
            });
        }
        for pair in steps.windows(2) {
            if pair[0].from == pair[1].from {
                return Err(RegistryError::Duplicate {
                    from: pair[0].from,
                    first: pair[0].name,
                    second: pair[1].name,
                });
            }
        }
        for expected in 0..target {
            if steps.get(expected as usize).map(|s| s.from) != Some(expected) {
                return Err(RegistryError::Gap { from: expected });
            }
        }

        Ok(Self { steps, target })
    }

    /// The builtin history up to [`CURRENT_VERSION`], checked once per process.
    pub fn builtin() -> Result<&'static Registry, MigrationError> {
        static BUILTIN: OnceLock<Result<Registry, RegistryError>> = OnceLock::new();
        BUILTIN
            .get_or_init(|| Registry::new(steps::builtin_steps(), CURRENT_VERSION))
            .as_ref()
            .map_err(|e| MigrationError::Registry(e.clone()))
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    pub fn step(&self, from: u32) -> Option<&MigrationStep> {
        self.steps.get(from as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedStep {
    pub from: u32,
    pub to: u32,
    pub name: &'static str,
}

/// Which steps ran, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from: u32,
    pub to: u32,
    pub applied: Vec<AppliedStep>,
}

/// Runs a registry against drawings, with defaults for one locale.
#[derive(Clone)]
pub struct Migrator<'r> {
    registry: &'r Registry,
    defaults: Arc<dyn DefaultsProvider + Send + Sync>,
    locale: Locale,
}

impl std::fmt::Debug for Migrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("target", &self.registry.target())
            .field("locale", &self.locale)
            .finish_non_exhaustive()
    }
}

impl<'r> Migrator<'r> {
    pub fn new(
        registry: &'r Registry,
        defaults: Arc<dyn DefaultsProvider + Send + Sync>,
        locale: Locale,
    ) -> Self {
        Self {
            registry,
            defaults,
            locale,
        }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Upgrade to the registry target, then parse and validate.
    pub fn migrate(&self, raw: RawDrawing) -> Result<Drawing, MigrationError> {
        let (raw, report) = self.migrate_to(raw, self.registry.target())?;
        let drawing = raw.into_drawing()?;

        match validate_drawing(&drawing) {
            ValidationResult::Ok => Ok(drawing),
            ValidationResult::Violations(violations) if report.applied.is_empty() => {
                Err(MigrationError::InvalidDocument { violations })
            }
            ValidationResult::Violations(violations) => Err(MigrationError::PostMigrationIntegrity {
                from: report.from,
                violations,
            }),
        }
    }

    /// Apply steps up to `target` without parsing the result. A drawing
    /// already at or past `target` (but not past the registry) is returned
    /// unchanged.
    pub fn migrate_to(
        &self,
        mut raw: RawDrawing,
        target: u32,
    ) -> Result<(RawDrawing, MigrationReport), MigrationError> {
        let supported = self.registry.target();
        let from = self.checked_version(&raw)?;
        if target > supported {
            return Err(MigrationError::UnknownFutureVersion {
                found: u64::from(target),
                supported,
            });
        }

        let defaults = self.defaults.metadata_defaults(self.locale);
        let ctx = StepContext {
            locale: self.locale,
            defaults: &defaults,
        };

        let mut applied = Vec::new();
        for version in from..target {
            let step = self
                .registry
                .step(version)
                .ok_or(RegistryError::Gap { from: version })?;
            debug!(from = version, step = step.name, "applying migration step");

            raw = (step.apply)(raw, &ctx).map_err(|failure| MigrationStepError {
                step: version,
                name: step.name,
                entity: failure.entity,
                reason: failure.reason,
            })?;
            raw.set_version(version + 1);
            applied.push(AppliedStep {
                from: version,
                to: version + 1,
                name: step.name,
            });
        }

        if !applied.is_empty() {
            info!(from, to = target, steps = applied.len(), "migrated drawing");
        }
        let to = from.max(target);
        Ok((raw, MigrationReport { from, to, applied }))
    }

    /// Re-run the pipeline over an already typed drawing.
    pub fn migrate_drawing(&self, drawing: &Drawing) -> Result<Drawing, MigrationError> {
        self.migrate(RawDrawing::from_drawing(drawing)?)
    }

    /// Migrate independent drawings in parallel. Results keep input order.
    pub fn migrate_all(&self, raws: Vec<RawDrawing>) -> Vec<Result<Drawing, MigrationError>> {
        raws.into_par_iter().map(|raw| self.migrate(raw)).collect()
    }

    fn checked_version(&self, raw: &RawDrawing) -> Result<u32, MigrationError> {
        let version = raw.version().map_err(|e| match e {
            ParseError::InvalidVersion { found } => MigrationError::InvalidVersion { found },
            other => MigrationError::Parse(other),
        })?;
        let supported = self.registry.target();
        match u32::try_from(version) {
            Ok(version) if version <= supported => Ok(version),
            _ => Err(MigrationError::UnknownFutureVersion {
                found: version,
                supported,
            }),
        }
    }
}
