use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Overrides `--log-level` with a full filter directive, e.g.
/// `dp_pipeline=debug,info`.
pub const LOG_ENV: &str = "DAILYPRESS_LOG";

static INIT: Once = Once::new();

/// Install the fmt subscriber once. Logs go to stderr so stdout only carries
/// the JSON output of a command.
pub fn init_logging(level: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    });
}
