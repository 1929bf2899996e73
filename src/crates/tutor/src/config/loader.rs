//! Configuration loader with dual-location support
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.tutor/tutor.toml
//! 3. Project-level config: ./.tutor/tutor.toml
//!
//! Later configs override earlier ones, section by section.

use crate::config::schema::{ConfigLayer, TutorConfig};
use crate::error::{Result, TutorError};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration loader that handles both user and project configs
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    project_config_path: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            user_config_path: dirs::home_dir().map(|home| home.join(".tutor").join("tutor.toml")),
            project_config_path: PathBuf::from(".tutor").join("tutor.toml"),
        }
    }

    /// Loader reading from explicit paths
    pub fn with_paths(user_config_path: Option<PathBuf>, project_config_path: PathBuf) -> Self {
        Self {
            user_config_path,
            project_config_path,
        }
    }

    /// Load defaults, then the user file, then the project file
    ///
    /// Missing files are skipped. A file that exists but fails to parse is an
    /// error. The merged result is validated before it is returned.
    pub async fn load(&self) -> Result<TutorConfig> {
        let mut config = TutorConfig::default();
        info!("Loading configuration with defaults");

        if let Some(user_path) = &self.user_config_path {
            if let Some(layer) = Self::load_layer(user_path).await? {
                debug!(path = %user_path.display(), "Loaded user-level config");
                config.merge(layer);
            } else {
                debug!(path = %user_path.display(), "User-level config not found");
            }
        }

        if let Some(layer) = Self::load_layer(&self.project_config_path).await? {
            debug!(path = %self.project_config_path.display(), "Loaded project-level config");
            config.merge(layer);
        } else {
            debug!(path = %self.project_config_path.display(), "Project-level config not found");
        }

        config.resolve_env_vars();
        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    async fn load_layer(path: &Path) -> Result<Option<ConfigLayer>> {
        if !fs::try_exists(path).await? {
            return Ok(None);
        }
        let content = fs::read_to_string(path).await.map_err(|e| {
            TutorError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let layer = toml::from_str(&content)?;
        Ok(Some(layer))
    }

    pub fn user_config_path(&self) -> Option<&Path> {
        self.user_config_path.as_deref()
    }

    pub fn project_config_path(&self) -> &Path {
        &self.project_config_path
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
