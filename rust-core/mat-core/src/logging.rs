//! # Logging
//!
//! `tracing-subscriber` setup for binaries and tests embedding mat.

use crate::config::LogFormat;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// Directive applied on top of `RUST_LOG`
pub const DEFAULT_DIRECTIVE: &str = "mat_core=info";

fn env_filter() -> EnvFilter {
    let filter = EnvFilter::from_default_env();
    match DEFAULT_DIRECTIVE.parse::<Directive>() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

/// Install the global fmt subscriber
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(format: LogFormat) -> bool {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter());
    let installed = match format {
        LogFormat::Plain => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.is_ok()
}
