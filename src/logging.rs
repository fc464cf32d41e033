//! Logging initialization and configuration.
//!
//! All diagnostics go to stderr so that command output printed on stdout
//! stays clean.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when nothing else is configured.
pub const DEFAULT_FILTER: &str = "shell_relay=info";

/// Filter used when `--debug` is passed.
pub const DEBUG_FILTER: &str = "shell_relay=debug";

/// Build the filter for the given options.
///
/// `--debug` wins over everything. Otherwise `level` is used when set,
/// either as a bare level (`warn`) scoped to this crate or as a full
/// directive string. With neither, `RUST_LOG` is consulted before
/// falling back to [`DEFAULT_FILTER`].
pub fn filter_for(debug: bool, level: Option<&str>) -> EnvFilter {
    if debug {
        return EnvFilter::new(DEBUG_FILTER);
    }

    match level {
        Some(level) if is_bare_level(level) => EnvFilter::new(format!("shell_relay={}", level)),
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    }
}

fn is_bare_level(level: &str) -> bool {
    matches!(
        level.to_ascii_lowercase().as_str(),
        "error" | "warn" | "info" | "debug" | "trace" | "off"
    )
}

/// Initialize the logging system.
///
/// # Panics
///
/// Panics if called more than once, or if another tracing subscriber
/// has already been set.
pub fn init(debug: bool, level: Option<&str>) {
    tracing_subscriber::registry()
        .with(filter_for(debug, level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Try to initialize the logging system.
///
/// Returns `Ok(())` if successful, or `Err` if logging has already been
/// initialized.
pub fn try_init(debug: bool, level: Option<&str>) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(filter_for(debug, level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init()
}
