//! Subscriber bootstrap. Logs go to stderr so stdout stays machine-readable.

use tracing_subscriber::EnvFilter;

use crate::error::CliError;

/// Install the global subscriber. `RUST_LOG` wins over `level`.
pub fn init(level: &str, json: bool) -> Result<(), CliError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|error| CliError::Command(format!("invalid --log-level '{level}': {error}")))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = if json {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|error| CliError::Command(format!("failed to install logger: {error}")))
}
