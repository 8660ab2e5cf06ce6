//! Tracing setup for hosts and tests
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the host. These helpers install a formatted subscriber filtered by the
//! `PIXROUTE_LOG` environment variable.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directives
pub const LOG_ENV: &str = "PIXROUTE_LOG";

/// Install a global subscriber at `warn` unless `PIXROUTE_LOG` says otherwise
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    init_tracing_with("warn")
}

/// Install a global subscriber with a fallback filter
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing_with(default_directives: &str) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Subscriber for tests: writes through the test harness capture
pub fn init_test_tracing() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("pixroute=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init()
        .is_ok()
}
