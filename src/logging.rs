//! Log output setup.

use tracing_subscriber::EnvFilter;

/// Environment variable overriding the log filter, e.g. `FAN_CONTROL_LOG=debug`.
pub const LOG_ENV: &str = "FAN_CONTROL_LOG";

/// Filter used when [`LOG_ENV`] is unset.
pub fn default_filter(debug: bool) -> &'static str {
    if debug { "debug" } else { "info" }
}

/// Install the global subscriber writing to stdout.
pub fn init(debug: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

    if let Err(e) = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter)
        .try_init()
    {
        eprintln!("Failed to initialize logging: {}", e);
    }
}
