//! Declarative default definitions.
//!
//! # Data Flow
//! ```text
//! ConfigDefinition<T> (field name → FieldDefinition)
//!     → merge.rs (collect initial values, deserialize into T)
//!     → seed value handed to the cache once, at setup
//!
//! ConfigSeed::Value(T)
//!     → passed through unchanged
//! ```
//!
//! # Design Decisions
//! - Field order never matters; entries live in a sorted map
//! - Fields without an initial value are left out, never nulled
//! - Missing mandatory defaults fail fast and name the field

pub mod entry;
pub mod merge;

pub use entry::{ConfigDefinition, ConfigSeed, FieldDefinition};
pub use merge::{merge, resolve_values, MergeError};
