use tracing_subscriber::EnvFilter;

/// Variable holding the log filter directives, e.g. `METR_LOG=metr=debug`
pub const LOG_ENV_VAR: &str = "METR_LOG";

const DEFAULT_FILTER: &str = "warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Send log output to stderr so it never interleaves with rendered replies
pub fn setup_logging() {
    // A subscriber may already be installed when running under a test harness
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
