use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging with the default `info` level
///
/// Log level can be controlled via the `RUST_LOG` environment variable.
/// Examples:
/// - `RUST_LOG=debug` - Debug level and above (one event per probe)
/// - `RUST_LOG=linkpulse=debug` - Debug level for linkpulse crate only
/// - `RUST_LOG=warn` - Only dropped log writes and failed measurements
pub fn init_logging() {
    init_logging_with_config("info", false);
}

/// Initialize structured logging from CLI options.
///
/// `RUST_LOG` still wins over `level` when it is set.
pub fn init_logging_with_config(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_target(false).with_thread_names(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_names(true)
                    .with_line_number(true)
                    .with_file(true),
            )
            .init();
    }
}
