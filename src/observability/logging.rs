//! Structured logging.
//!
//! # Responsibilities
//! - Install a default `tracing` subscriber for hosts that have none
//! - Honour `RUST_LOG` over the supplied default filter

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "remote_config=info";

/// Install a fmt subscriber filtered by `RUST_LOG` or `default_filter`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_logging(default_filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        init_logging(DEFAULT_FILTER);
        assert!(!init_logging("debug"));
    }
}
