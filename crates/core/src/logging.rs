//! Tracing subscriber setup.

use crate::config::{LogFormat, LoggingConfig};
use tracing::Level;
use tracing_subscriber::fmt;

/// Install a global `fmt` subscriber for the given configuration.
///
/// Returns `false` when a subscriber was already installed, which is not an
/// error: embedding hosts usually bring their own.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let level: Level = config.level.into();
    let builder = fmt()
        .with_max_level(level)
        .with_target(config.with_target);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.is_ok()
}
