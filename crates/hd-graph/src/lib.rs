//! hd-graph: reference resolution for hydrodraw drawings.
//!
//! Provides:
//! - A single id index over every level and the shared pool
//! - Parent/child and pipe incidence adjacency
//! - Per-system sub-graphs and contiguous indexing for solver integration
//!
//! # Example
//!
//! ```
//! use hd_document::parse;
//! use hd_graph::resolve;
//!
//! let drawing = parse(r#"{
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
//!     "g": {
//!       "uid": "g", "name": "Ground", "abbreviation": "G", "floorHeightM": 0,
//!       "entities": {
//!         "a": { "type": "FITTING", "uid": "a", "parentUid": null, "systemUid": "cold-water" },
//!         "b": { "type": "FITTING", "uid": "b", "parentUid": null, "systemUid": "cold-water" },
//!         "p": { "type": "PIPE", "uid": "p", "parentUid": null, "systemUid": "cold-water",
//!                "network": "RETICULATIONS", "endpointUid": ["a", "b"] }
//!       }
//!     }
//!   },
//!   "shared": {}
//! }"#).unwrap();
//!
//! let graph = resolve(&drawing).unwrap();
//! let a = graph.id_of("a").unwrap();
//! assert_eq!(graph.incident_pipes(a).len(), 1);
//! assert_eq!(graph.system("cold-water").unwrap().pipes.len(), 1);
//! ```

pub mod builder;
pub mod error;
pub mod graph;
pub mod indexing;
pub(crate) mod validate;

// Re-exports for ergonomics
pub use builder::{GraphBuilder, resolve, scan};
pub use error::ReferentialIntegrityError;
pub use graph::{Graph, GraphEntity, SystemSubgraph};
pub use indexing::SystemIndexMap;
