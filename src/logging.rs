/// Logging bootstrap
///
/// Starts a stderr logger once per process. `RUST_LOG` takes precedence over
/// the configured spec. Initialization never panics; a failure is reported
/// and the app keeps running without logs.

use flexi_logger::{Logger, LoggerHandle};
use std::sync::OnceLock;

static LOGGER: OnceLock<LoggerHandle> = OnceLock::new();

/// Initialize logging with a spec such as `"info"` or `"concept_deck=debug"`.
///
/// Repeated calls are no-ops.
pub fn init(spec: &str) -> Result<(), String> {
    if LOGGER.get().is_some() {
        return Ok(());
    }

    let handle = Logger::try_with_env_or_str(spec)
        .map_err(|err| format!("invalid log spec `{spec}`: {err}"))?
        .log_to_stderr()
        .format(flexi_logger::colored_default_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    // A concurrent init that lost the race just drops its handle
    let _ = LOGGER.set(handle);
    log::info!("logging initialized (spec: {spec})");
    Ok(())
}
