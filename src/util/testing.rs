//! Shared test setup.

use std::sync::Once;

use tracing::debug;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

static TEST_SETUP: Once = Once::new();

/// Installs a stderr subscriber once per test binary.
///
/// `RUST_LOG` wins; without it memtree logs at debug and everything else
/// at warn.
pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,memtree=debug"));

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_test_writer()
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(env_filter),
        );

        if tracing::dispatcher::has_been_set() {
            debug!("Tracing subscriber already set");
        } else if let Err(e) = subscriber.try_init() {
            eprintln!("Error: Failed to set up logging: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_repeated_calls_when_initialising_then_is_idempotent() {
        init_test_setup();
        init_test_setup();
    }
}
