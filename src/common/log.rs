//! Logger initialisation

use log::LevelFilter;
use std::str::FromStr;

use crate::config::LOG_LEVEL_STR;

/// Initialise the global logger
///
/// `RUST_LOG` takes precedence over `level` when it is set. An unknown
/// `level` falls back to the default instead of being handed to env_logger,
/// which would read it as a module filter and silence the crate.
///
/// # Parameters
///
/// * `level` - Default log level (off, error, warn, info, debug, trace)
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", effective_level(level));

    // A second initialisation (tests, embedding) is not an error worth failing on
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// The level actually used for `level`
pub fn effective_level(level: &str) -> &str {
    match LevelFilter::from_str(level.trim()) {
        Ok(_) => level.trim(),
        Err(_) => LOG_LEVEL_STR,
    }
}
