//! Structured logging init (spec §A.2). Sinks are external: this just
//! wires `tracing-subscriber` to stdout once at process start.

use tracing_subscriber::{fmt, EnvFilter};
use tracing_subscriber::prelude::*;

/// Install a global `tracing` subscriber. `RUST_LOG` overrides the
/// default `info` filter. Safe to call once; a second call is a no-op
/// error from `tracing`'s global dispatcher, which we ignore.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
