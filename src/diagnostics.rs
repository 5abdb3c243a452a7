use crate::{config::ConfigError, runtime::error::RuntimeError};
use miette::Report;
use std::sync::OnceLock;
use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

/// Environment variable holding the log filter, e.g. `PROBE_LOG=debug`.
pub const LOG_ENV: &str = "PROBE_LOG";

static TRACING: OnceLock<()> = OnceLock::new();

/// Installs the process-wide subscriber. Later calls are no-ops.
pub fn init_tracing(default_directive: &str) {
    TRACING.get_or_init(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(default_directive));
        let _ = SubscriberBuilder::default()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .try_init();
    });
}

pub fn report_config_error(error: ConfigError) {
    eprintln!("{:?}", Report::new(error));
}

pub fn report_runtime_error(error: &RuntimeError) {
    eprintln!("Runtime error: {}", error);
}
