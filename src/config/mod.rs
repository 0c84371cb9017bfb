//! Store options loaded from a TOML file.
//!
//! # Data Flow
//! ```text
//! options file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → OptionsFile::into_setup_options
//!     → SetupConfigOptions handed to setup_config
//! ```
//!
//! # Design Decisions
//! - Every field has a default; an empty file yields the stock options
//! - Durations are written in milliseconds, or `"never"` where "never" is meaningful
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_options, parse_options, OptionsError};
pub use schema::{MillisOrNever, OptionsFile, PersistOptionsFile, QueryOptionsFile, RetrySetting};
pub use validation::{validate_options, ValidationError};
