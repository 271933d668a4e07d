//! Tracing setup shared by both binaries.

/// Installs a `tracing_subscriber::fmt` layer honoring `RUST_LOG`,
/// defaulting to `info` when unset or invalid.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}
