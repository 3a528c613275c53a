//! Tracing subscriber setup for frontends.
//!
//! Output goes to stderr so stdout stays free for command output. The filter
//! defaults to `info` and follows `RUST_LOG` when set.

use std::io;
use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a human-readable subscriber. Later calls are ignored.
pub fn init_tracing() {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer().with_writer(io::stderr).with_target(false);
        // A subscriber installed elsewhere (e.g. by a test harness) wins.
        let _ = tracing_subscriber::registry().with(env_filter()).with(fmt_layer).try_init();
    });
}

/// Install a JSON-lines subscriber. Later calls are ignored.
pub fn init_tracing_json() {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_target(true)
            .with_current_span(true);
        let _ = tracing_subscriber::registry().with(env_filter()).with(fmt_layer).try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialisation_is_harmless() {
        init_tracing();
        init_tracing();
        init_tracing_json();
        tracing::info!("still logging");
    }
}
