//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.deckchat/config.json`) and environment.
//! Environment variables win over the file so deployments can run without editing it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Relay server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion provider settings (Azure OpenAI deployment).
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// Relay bind and port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// HTTP port for /api/chat and static assets (default 5173).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

fn default_server_port() -> u16 {
    5173
}

fn default_server_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
        }
    }
}

/// Provider connection settings. Endpoint and API key have no defaults and
/// must come from the file or the AZURE_OPENAI_* environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Resource endpoint, e.g. "https://my-resource.openai.azure.com". Overridden by AZURE_OPENAI_ENDPOINT.
    pub endpoint: Option<String>,

    /// API key for the resource. Overridden by AZURE_OPENAI_API_KEY.
    pub api_key: Option<String>,

    /// API version query parameter (default "2024-08-01-preview"). Overridden by AZURE_OPENAI_API_VERSION.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Deployment name of the chat model (default "gpt-4"). Overridden by AZURE_OPENAI_DEPLOYMENT_NAME.
    #[serde(default = "default_deployment")]
    pub deployment: String,
}

fn default_api_version() -> String {
    "2024-08-01-preview".to_string()
}

fn default_deployment() -> String {
    "gpt-4".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            api_version: default_api_version(),
            deployment: default_deployment(),
        }
    }
}

/// A non-empty trimmed env var value, if set.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// A non-empty trimmed config value, if set.
fn config_value(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the provider endpoint: env AZURE_OPENAI_ENDPOINT overrides config.
/// Trailing slashes are stripped so request paths can be appended directly.
pub fn resolve_endpoint(config: &Config) -> Option<String> {
    env_value("AZURE_OPENAI_ENDPOINT")
        .or_else(|| config_value(&config.provider.endpoint))
        .map(|s| s.trim_end_matches('/').to_string())
}

/// Resolve the provider API key: env AZURE_OPENAI_API_KEY overrides config.
pub fn resolve_api_key(config: &Config) -> Option<String> {
    env_value("AZURE_OPENAI_API_KEY").or_else(|| config_value(&config.provider.api_key))
}

/// Resolve the API version: env AZURE_OPENAI_API_VERSION overrides config.
pub fn resolve_api_version(config: &Config) -> String {
    env_value("AZURE_OPENAI_API_VERSION").unwrap_or_else(|| config.provider.api_version.clone())
}

/// Resolve the deployment name: env AZURE_OPENAI_DEPLOYMENT_NAME overrides config.
pub fn resolve_deployment(config: &Config) -> String {
    env_value("AZURE_OPENAI_DEPLOYMENT_NAME").unwrap_or_else(|| config.provider.deployment.clone())
}

/// Resolve the server port: env PORT overrides config; unparsable values are ignored.
pub fn resolve_port(config: &Config) -> u16 {
    env_value("PORT")
        .and_then(|s| s.parse().ok())
        .unwrap_or(config.server.port)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("DECKCHAT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".deckchat").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or DECKCHAT_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_server_port_and_bind() {
        let s = ServerConfig::default();
        assert_eq!(s.port, 5173);
        assert_eq!(s.bind, "127.0.0.1");
    }

    #[test]
    fn default_provider_version_and_deployment() {
        let p = ProviderConfig::default();
        assert_eq!(p.api_version, "2024-08-01-preview");
        assert_eq!(p.deployment, "gpt-4");
        assert!(p.endpoint.is_none());
        assert!(p.api_key.is_none());
    }

    #[test]
    fn provider_defaults_apply_to_partial_file() {
        let config: Config =
            serde_json::from_str(r#"{"provider":{"endpoint":"https://r.openai.azure.com"}}"#)
                .expect("parse");
        assert_eq!(
            config.provider.endpoint.as_deref(),
            Some("https://r.openai.azure.com")
        );
        assert_eq!(config.provider.api_version, "2024-08-01-preview");
        assert_eq!(config.provider.deployment, "gpt-4");
    }

    #[test]
    fn endpoint_trailing_slash_is_stripped() {
        let mut config = Config::default();
        config.provider.endpoint = Some("https://r.openai.azure.com/".to_string());
        assert_eq!(
            resolve_endpoint(&config).as_deref(),
            Some("https://r.openai.azure.com")
        );
    }

    #[test]
    fn blank_config_values_are_ignored() {
        let mut config = Config::default();
        config.provider.api_key = Some("   ".to_string());
        assert_eq!(resolve_api_key(&config), None);
    }
}
