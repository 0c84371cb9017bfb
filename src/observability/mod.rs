//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! query client / persister / fetch helper produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → whatever subscriber the host installs (init_logging is a default)
//!     → whatever metrics recorder the host installs
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event, never formatted payloads
//! - Metrics go through the `metrics` facade; no exporter is bundled
//! - Without a recorder, metric calls are no-ops

pub mod logging;
pub mod metrics;
