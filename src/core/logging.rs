//! Tracing setup for the command-line binary
//!
//! Log output goes to stderr so forecast output on stdout stays pipeable.
//! `TFT_LOG` takes an `EnvFilter` directive (default `warn`);
//! `TFT_LOG_FORMAT=json` switches to JSON lines.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "TFT_LOG";
pub const LOG_FORMAT_ENV: &str = "TFT_LOG_FORMAT";

/// Install the global subscriber; `verbose` raises the default level to `debug`
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "tft=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    // try_init: a second call (e.g. from tests) keeps the first subscriber
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
