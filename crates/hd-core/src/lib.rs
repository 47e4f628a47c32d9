//! hd-core: stable foundation for hydrodraw.
//!
//! Contains:
//! - ids (compact arena ids for resolved drawing graphs)
//! - units (uom lengths for persisted metre values)
//! - systems (well-known flow-system uids, rough-in ordering policy)
//! - locale (locales that own default catalogs)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod locale;
pub mod systems;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use locale::Locale;
pub use units::*;
