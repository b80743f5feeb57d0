//! Diagnostic output for the team and its agents.
//!
//! Every console message goes through `tracing`. The filter comes from
//! `RUST_LOG` and defaults to `info`; a silent run installs the `off` filter,
//! which never changes control flow.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Output: stderr, compact format, with thread names so agent lines can be
/// told apart from the coordinator.
///
/// # Example
/// ```bash
/// RUST_LOG=team=debug cargo run -- run
/// ```
pub fn init(silent: bool) {
    let filter = if silent {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // A subscriber may already be installed (tests, embedding); keep the first one.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_names(true)
                .compact(),
        )
        .try_init();
}
