//! Initialize the configuration directory: create ~/.deckchat and a default
//! config file with the provider fields ready to fill in.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Create the config directory and a default config file if they do not
/// exist. Returns the config directory path.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        let default_config = serde_json::to_string_pretty(&Config::default())
            .context("serializing default config")?;
        std::fs::write(config_path, default_config)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!("config already exists at {}, skipping", config_path.display());
    }

    Ok(config_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_a_parseable_default_config() {
        let dir = std::env::temp_dir().join(format!("deckchat-init-test-{}", uuid::Uuid::new_v4()));
        let config_path = dir.join("config.json");
        init_config_dir(&config_path).expect("init");

        let s = std::fs::read_to_string(&config_path).expect("read config");
        let config: Config = serde_json::from_str(&s).expect("parse config");
        assert_eq!(config.server.port, 5173);
        assert!(config.provider.endpoint.is_none());

        // Second run leaves the existing file alone.
        init_config_dir(&config_path).expect("re-init");
    }
}
