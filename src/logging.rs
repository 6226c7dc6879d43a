//! Logging setup.
//!
//! Diagnostics go through `tracing` to stderr, so they never mix with the
//! plan and summary printed on stdout. `RUST_LOG` overrides the level chosen
//! by the flags.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber.
///
/// `verbose` selects DEBUG instead of WARN. `json` switches to one JSON object
/// per line for machine consumption.
pub fn init(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// The progress bar already reports what INFO would, so quiet runs only
/// show warnings.
fn default_directive(verbose: bool) -> &'static str {
    if verbose { "media_batch=debug" } else { "warn" }
}
