use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::Cli;

/// Installs the global subscriber. Logs go to stderr so stdout stays a clean report.
pub fn init_logging(cli: &Cli) {
    let level = cli.log_level.as_tracing_level();
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let subscriber = tracing_subscriber::registry().with(filter);

    if cli.log_json {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .init();
    }
}
