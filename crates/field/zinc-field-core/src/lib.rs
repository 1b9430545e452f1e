//! Zinc Field Core (single-threaded computed field engine)
//!
//! Fields are named, reference-counted nodes of an acyclic source graph that
//! compute fixed-size numeric vectors (and element xi derivatives) at a
//! location and time. Evaluation goes through an [`EvaluationCache`] that
//! memoizes every field once per location; assignment runs the inverse
//! direction. A [`Manager`] registers fields and sends batched change
//! messages, and a [`FieldModule`] binds the field factories to one region.

pub mod cache;
pub mod config;
pub mod core;
pub mod error;
pub mod field;
pub mod location;
pub mod manager;
pub mod module;
pub mod quaternion;
pub mod types;
pub mod value_cache;

// Re-exports for consumers
pub use cache::EvaluationCache;
pub use config::Config;
pub use crate::core::{ComponentSource, FieldKind, NativeResolution};
pub use error::{CompositeError, FieldError};
pub use field::{Field, FieldDescription};
pub use location::Location;
pub use manager::{ChangeScope, Manager, ManagerMessage, Subscription};
pub use module::FieldModule;
pub use types::{AssignmentResult, ChangeFlags, FieldId};
pub use value_cache::ValueCache;
pub use zinc_region_core as region;
