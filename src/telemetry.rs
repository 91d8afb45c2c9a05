//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Filtering follows `RUST_LOG` and defaults
/// to `info`. Calling it twice is a no-op.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let _ = if json {
        builder.json().with_target(false).try_init()
    } else {
        builder.try_init()
    };
}
