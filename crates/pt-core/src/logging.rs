//! `tracing` subscriber setup.
//!
//! Console lines are human-readable; the optional file layer writes one JSON
//! object per event into a daily-rotating file so batches flushed by
//! [`LogSink`](crate::cache::LogSink) can be post-processed. The level comes
//! from `RUST_LOG` when set, otherwise from the caller.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// - `log_level`: fallback filter when `RUST_LOG` is unset (e.g. `"info"`,
///   `"pt_core=debug,info"`)
/// - `log_dir`: directory for `{module_name}.YYYY-MM-DD` files
/// - `module_name`: file prefix (e.g. `"pt-runner"`)
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(log_level: &str, log_dir: Option<&str>, module_name: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let console = fmt::layer().with_target(true).with_thread_ids(true);

    let file = log_dir.map(|dir| {
        fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(tracing_appender::rolling::daily(dir, module_name))
            .with_ansi(false)
            .with_target(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .is_ok()
}
