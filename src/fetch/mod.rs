//! Config fetch helper.
//!
//! # Data Flow
//! ```text
//! URL + FetchOptions
//!     → client.rs (issue request with passthrough options)
//!     → 2xx: raw response, or parsed JSON body
//!     → non-2xx: optional debug log of the body → FetchError::Status
//! ```
//!
//! # Design Decisions
//! - No retries here; failures propagate to the query client, which owns retry policy
//! - Debug logging never affects the outcome

pub mod client;
pub mod error;

pub use client::{fetch_config, fetch_json, json_updater, FetchOptions, RequestOptions};
pub use error::{FetchError, FetchResult};
