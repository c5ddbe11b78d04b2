//! Logger initialization.

use log::SetLoggerError;

/// Attempt to init a env_logger for the collector. The logger reads its
/// filter from `HYBRID_IMMIX_LOG`, defaulting to `info`. Bindings that
/// install their own logger can simply never call this.
pub fn try_init() -> Result<(), SetLoggerError> {
    env_logger::try_init_from_env(env_logger::Env::default().filter_or("HYBRID_IMMIX_LOG", "info"))
}
