use std::sync::Arc;

use mailquote_core::config::{AppConfig, LoadOptions};
use mailquote_graph::{
    build_http_client, mailbox_client, token_provider, ConnectionProber, GraphError,
};

use crate::commands::{runtime, CommandResult};

/// Prints the same result body `test-connection` returns. Exit code 1 when
/// any step fails.
pub fn run(options: LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "probe",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let prober = match prober(&config) {
        Ok(prober) => prober,
        Err(error) => return CommandResult::failure("probe", "client_setup", error.to_string(), 3),
    };
    let runtime = match runtime("probe") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(prober.probe(&config.graph));
    let exit_code = if result.success { 0 } else { 1 };
    CommandResult::report("probe", &result, exit_code)
}

pub(crate) fn prober(config: &AppConfig) -> Result<ConnectionProber, GraphError> {
    let client = build_http_client(&config.graph)?;
    let mailbox = Arc::new(mailbox_client(client.clone(), &config.graph));
    Ok(ConnectionProber::new(Arc::new(token_provider(client, &config.graph)), mailbox))
}
