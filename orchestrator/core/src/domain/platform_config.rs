// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Platform Configuration
//
// Defines the configuration manifest for an Orion platform process:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Database connection settings
// - Secret key used to encrypt model configurations at rest
// - Pagination, connector probe and chat history limits

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "100monkeys.ai/v1";
pub const KIND: &str = "PlatformConfig";

const PLACEHOLDER_SECRETS: &[&str] = &["changeme", "change-me", "CHANGE_ME", "secret", "<secret>"];

/// Top-level platform configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "PlatformConfig")
    pub kind: String,

    pub metadata: ConfigMetadata,

    #[serde(default)]
    pub spec: PlatformSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformSpec {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub pagination: PaginationConfig,

    #[serde(default)]
    pub connectors: ConnectorsConfig,

    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL URL. Absent means in-memory repositories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Literal key or `env:VAR_NAME`.
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: default_secret_key(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_page_limit")]
    pub default_limit: usize,

    #[serde(default = "default_max_page_limit")]
    pub max_limit: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_page_limit(),
            max_limit: default_max_page_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConnectorsConfig {
    /// Used when a connection test does not specify a timeout.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_s: u64,

    #[serde(default = "default_max_probe_timeout")]
    pub max_probe_timeout_s: u64,
}

impl Default for ConnectorsConfig {
    fn default() -> Self {
        Self {
            probe_timeout_s: default_probe_timeout(),
            max_probe_timeout_s: default_max_probe_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Persisted messages replayed into a thread invocation.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_secret_key() -> String {
    "env:ORION_SECRET_KEY".to_string()
}

fn default_page_limit() -> usize {
    20
}

fn default_max_page_limit() -> usize {
    100
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_max_probe_timeout() -> u64 {
    30
}

fn default_history_window() -> usize {
    20
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ConfigMetadata {
                name: "orion".to_string(),
                version: Some("1.0.0".to_string()),
            },
            spec: PlatformSpec::default(),
        }
    }
}

impl PlatformConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. ORION_CONFIG_PATH environment variable
    /// 2. ./orion-config.yaml (working directory)
    /// 3. ~/.orion/config.yaml (user home)
    /// 4. /etc/orion/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("ORION_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./orion-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".orion").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/orion/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply `DATABASE_URL` and `ORION_SECRET_KEY` from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            tracing::info!("Environment override: DATABASE_URL");
            self.spec.database.url = Some(url);
        }
        // Only a literal key in the file is replaced; `env:` indirection already
        // resolves at use time.
        if lookup("ORION_SECRET_KEY").is_some_and(|v| !v.trim().is_empty())
            && !self.spec.security.secret_key.starts_with("env:")
        {
            tracing::info!("Environment override: ORION_SECRET_KEY");
            self.spec.security.secret_key = default_secret_key();
        }
    }

    /// Resolve the configured secret key, following `env:VAR` indirection.
    pub fn resolve_secret_key(&self) -> anyhow::Result<String> {
        resolve_env_value(&self.spec.security.secret_key)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.trim().is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let db = &self.spec.database;
        if let Some(url) = &db.url {
            if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
                anyhow::bail!("spec.database.url must be a postgres:// or postgresql:// URL");
            }
        }
        if db.max_connections == 0 {
            anyhow::bail!("spec.database.max_connections must be at least 1");
        }

        let key = self.spec.security.secret_key.trim();
        if key.is_empty() {
            anyhow::bail!("spec.security.secret_key cannot be empty");
        }
        if let Some(var) = key.strip_prefix("env:") {
            if var.trim().is_empty() {
                anyhow::bail!("spec.security.secret_key: 'env:' requires a variable name");
            }
        } else if PLACEHOLDER_SECRETS.contains(&key) {
            anyhow::bail!("spec.security.secret_key is a placeholder value; set a real secret");
        }

        let page = &self.spec.pagination;
        if page.max_limit == 0 || page.default_limit == 0 || page.default_limit > page.max_limit {
            anyhow::bail!("spec.pagination requires 1 <= default_limit <= max_limit");
        }

        let probes = &self.spec.connectors;
        if probes.probe_timeout_s == 0 || probes.probe_timeout_s > probes.max_probe_timeout_s {
            anyhow::bail!("spec.connectors requires 1 <= probe_timeout_s <= max_probe_timeout_s");
        }

        Ok(())
    }
}

/// `env:VAR` reads the variable; any other value is returned as-is.
pub fn resolve_env_value(value: &str) -> anyhow::Result<String> {
    match value.strip_prefix("env:") {
        Some(var) => std::env::var(var.trim())
            .map_err(|_| anyhow::anyhow!("Environment variable '{}' is not set", var.trim())),
        None => Ok(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlatformConfig::default();
        assert_eq!(config.api_version, API_VERSION);
        assert_eq!(config.kind, KIND);
        assert_eq!(config.spec.pagination.default_limit, 20);
        assert_eq!(config.spec.connectors.max_probe_timeout_s, 30);
        assert_eq!(config.spec.chat.history_window, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = PlatformConfig::from_yaml_str(
            r#"
apiVersion: 100monkeys.ai/v1
kind: PlatformConfig
metadata:
  name: staging
spec:
  database:
    url: postgres://orion@localhost/orion
  pagination:
    max_limit: 50
"#,
        )
        .unwrap();
        assert_eq!(config.metadata.name, "staging");
        assert_eq!(config.spec.database.max_connections, 5);
        assert_eq!(config.spec.pagination.default_limit, 20);
        assert_eq!(config.spec.pagination.max_limit, 50);
        assert_eq!(config.spec.security.secret_key, "env:ORION_SECRET_KEY");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = PlatformConfig::default();

        config.kind = "NodeConfig".to_string();
        assert!(config.validate().is_err());
        config.kind = KIND.to_string();

        config.spec.security.secret_key = "changeme".to_string();
        assert!(config.validate().is_err());
        config.spec.security.secret_key = "env:".to_string();
        assert!(config.validate().is_err());
        config.spec.security.secret_key = "a-real-secret".to_string();
        assert!(config.validate().is_ok());

        config.spec.database.url = Some("mysql://nope".to_string());
        assert!(config.validate().is_err());
        config.spec.database.url = None;

        config.spec.pagination.default_limit = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = PlatformConfig::default();
        config.spec.security.secret_key = "file-secret".to_string();
        config.apply_overrides_from(|name| match name {
            "DATABASE_URL" => Some("postgres://env@db/orion".to_string()),
            "ORION_SECRET_KEY" => Some("from-env".to_string()),
            _ => None,
        });
        assert_eq!(config.spec.database.url.as_deref(), Some("postgres://env@db/orion"));
        assert_eq!(config.spec.security.secret_key, "env:ORION_SECRET_KEY");
    }
}
