//! Lifecycle of background work.
//!
//! # Data Flow
//! ```text
//! QueryClient::unmount / MountedConfig::unmount (or drop)
//!     → Teardown::trigger
//!     → persist subscription, refetch interval, gc timers exit
//!     → in-flight fetches aborted; cached data kept
//! ```
//!
//! # Design Decisions
//! - Every background task owns a subscription and exits on the first signal
//! - Teardown is sticky: waiters created after the trigger resolve at once

pub mod shutdown;

pub use shutdown::Teardown;
