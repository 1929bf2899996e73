//! Tracing subscriber setup
//!
//! Library crates only emit events; binaries and tests call [`init`] once.

use crate::config::LoggingSection;
use crate::error::{Result, TutorError};
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` when set, otherwise the configured level
pub fn env_filter(section: &LoggingSection) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&section.level).map_err(|e| {
        TutorError::Config(format!("invalid log level '{}': {}", section.level, e))
    })
}

/// Install the global subscriber
///
/// Fails if a subscriber is already installed.
pub fn init(section: &LoggingSection) -> Result<()> {
    let filter = env_filter(section)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match section.format.as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        "compact" => builder.compact().try_init(),
        other => {
            return Err(TutorError::Config(format!("unknown log format '{}'", other)));
        }
    };
    installed.map_err(|e| TutorError::Config(format!("failed to install subscriber: {}", e)))
}
