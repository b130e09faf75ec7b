// Tracing setup for the command line

use tracing::Level;

/// Parse a `--log-level` value, falling back to INFO for unknown names
pub fn parse_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize the tracing subscriber
///
/// Logs go to stderr so tool output echoed on stdout stays clean.
pub fn init_logging(log_level: &str) {
    use tracing_subscriber::fmt;

    let level = parse_level(log_level);
    let verbose = level >= Level::DEBUG;

    fmt()
        .with_max_level(level)
        .with_target(verbose)
        .with_thread_ids(verbose)
        .with_writer(std::io::stderr)
        .init();
}
