pub use seamcut_core::config::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Locations searched, in order, when no config path is given.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["./seamcut.toml", "~/.config/seamcut/config.toml"];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    match find_default_config() {
        Some(path) => {
            tracing::debug!("Using config file {:?}", path);
            load_config(&path)
        }
        None => Ok(Config::default()),
    }
}

/// First existing file among [`DEFAULT_CONFIG_PATHS`].
pub fn find_default_config() -> Option<PathBuf> {
    DEFAULT_CONFIG_PATHS
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
        .find(|p| p.exists())
}

/// Validate configuration
///
/// Settings the engine cannot run with are errors; anything it merely clamps
/// is logged as a warning.
pub fn validate_config(config: &Config) -> Result<()> {
    config.check()?;

    for warning in config.validate() {
        tracing::warn!("Config: {}", warning);
    }

    Ok(())
}
