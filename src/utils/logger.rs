//! Logging bootstrap for hosts that don't install their own `log` backend.

use env_logger::Env;

/// Install `env_logger`, honouring `RUST_LOG` and defaulting to `info`.
///
/// Does nothing if a logger is already installed.
pub fn init() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
