//! hd-document: the persisted drawing format.
//!
//! - `schema`: typed latest-version [`Drawing`] with levels, metadata and the shared pool
//! - `entity`: the [`Entity`] sum type and its reference accessors
//! - `parse`: strict JSON/YAML reading and serialization
//! - `raw`: untyped [`RawDrawing`] that migration steps transform
//!
//! # Example
//!
//! ```
//! use hd_document::{parse, serialize};
//!
//! let text = r#"{
//!   "version": 9,
//!   "metadata": {
//!     "units": {
//!       "lengthMeasurementSystem": "METRIC",
//!       "volumeMeasurementSystem": "METRIC",
//!       "velocityMeasurementSystem": "METRIC",
//!       "pressureMeasurementSystem": "METRIC",
//!       "temperatureMeasurementSystem": "METRIC"
//!     },
//!     "flowSystems": [],
//!     "catalog": {},
//!     "priceTable": {}
//!   },
//!   "levels": {
//!     "ground": {
//!       "uid": "ground", "name": "Ground", "abbreviation": "G",
//!       "floorHeightM": 0.0, "entities": {}
//!     }
//!   },
//!   "shared": {}
//! }"#;
//!
//! let drawing = parse(text).unwrap();
//! assert_eq!(drawing.levels.len(), 1);
//! assert_eq!(parse(&serialize(&drawing).unwrap()).unwrap(), drawing);
//! ```

pub mod entity;
pub mod parse;
pub mod raw;
pub mod schema;

pub use entity::{
    BackgroundImageEntity, BigValveDef, BigValveEntity, DirectedValveEntity, Entity, EntityCore,
    EntityKind, FittingEntity, FixtureEntity, FlowSourceEntity, GasApplianceEntity,
    LoadNodeEntity, NoParent, PipeEntity, PlantDef, PlantEntity, Reference, ReferenceField,
    RiserEntity, RoughIn, SystemNodeEntity, ValveDef,
};
pub use parse::{ParseError, parse, parse_value, parse_yaml, serialize, serialize_yaml};
pub use raw::{Object, RawDrawing};
pub use schema::{
    Drawing, FlowSystem, Level, MeasurementSystem, Metadata, NetworkType, Networks, Properties,
    Scope, UnitsParameters, VelocityMeasurementSystem, VolumeMeasurementSystem,
};
