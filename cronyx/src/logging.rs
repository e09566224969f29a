//! `tracing-subscriber` initialization. The effective level is resolved
//! before this is called: CLI flag, then `CRONYX_LOG_LEVEL`, then the INI
//! `log-level` global setting, in that order (see `cli::resolve_log_level`).

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber with `level` as the default
/// filter directive. Safe to call once per process; a second call is a
/// programmer error and panics, same as `tracing_subscriber::fmt::init`.
pub fn init(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
