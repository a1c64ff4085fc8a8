use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber printing compile and sampling
/// events to stderr. Filtering follows `RUST_LOG`, defaulting to `info`.
///
/// Call it once at startup; installing a second subscriber fails.
pub fn init_logging() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}
