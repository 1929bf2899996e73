//! Configuration management for the tutor service
//!
//! Supports dual-location configuration:
//! - User-level: ~/.tutor/tutor.toml
//! - Project-level: ./.tutor/tutor.toml
//!
//! Project-level config overrides user-level config.

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    ConfigLayer, EngineSection, LoggingSection, ReportsSection, RetrySection, StorageSection,
    TutorConfig,
};

use crate::Result;

/// Load configuration from both locations with project config taking precedence
pub async fn load_config() -> Result<TutorConfig> {
    ConfigLoader::new().load().await
}
