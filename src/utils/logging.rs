use tracing_subscriber::EnvFilter;

/// Initialize tracing for a binary.
///
/// `RUST_LOG` takes precedence; otherwise `default_level` applies to the
/// whole crate. Interactive console output goes to stdout, so diagnostics are
/// written to stderr to keep the `Admin>` prompt readable.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    // try_init so tests can call this repeatedly without panicking
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
