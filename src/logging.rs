use std::env;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding an `EnvFilter` directive; overrides `-v`.
pub const LOG_ENV: &str = "ANCHORPATCH_LOG";

/// Level directive for a `-v` count: warn, info, debug, then trace.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber. Diagnostics go to stderr so stdout stays
/// reserved for previews and the report.
pub fn init_logger(verbosity: u8, ansi: bool) {
    let filter = env::var(LOG_ENV)
        .ok()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .with_ansi(ansi),
        )
        .with(filter)
        .try_init();
}
