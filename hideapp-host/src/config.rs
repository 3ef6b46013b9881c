//! Plugin configuration
//!
//! Read from a JSON document by the plugin host. Every field has a default,
//! so `{}` is a valid configuration.

use crate::error::ConfigError;
use crate::installer::InstallPolicy;
use serde::{Deserialize, Serialize};

/// Where the plugin is loaded, which decides the profile and rule grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginMode {
    /// Inside the registry service; rules name target callers
    #[default]
    System,
    /// Inside one app process; rules are a plain hidden list
    InProcess,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    pub mode: PluginMode,
    pub min_installed_hooks: usize,
    /// Events kept by the in-memory audit trail
    pub audit_capacity: usize,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            mode: PluginMode::default(),
            min_installed_hooks: InstallPolicy::default().min_installed_hooks,
            audit_capacity: 256,
        }
    }
}

impl PluginConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidPluginConfig(e.to_string()))
    }

    pub fn install_policy(&self) -> InstallPolicy {
        InstallPolicy {
            min_installed_hooks: self.min_installed_hooks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PluginConfig::from_json("{}").unwrap();
        assert_eq!(config, PluginConfig::default());
        assert_eq!(config.mode, PluginMode::System);
        assert_eq!(config.install_policy(), InstallPolicy::default());
    }

    #[test]
    fn test_in_process_mode() {
        let config =
            PluginConfig::from_json(r#"{"mode": "in_process", "min_installed_hooks": 1}"#).unwrap();
        assert_eq!(config.mode, PluginMode::InProcess);
        assert_eq!(config.install_policy().min_installed_hooks, 1);
        assert_eq!(config.audit_capacity, 256);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            PluginConfig::from_json(r#"{"mode": "kernel"}"#),
            Err(ConfigError::InvalidPluginConfig(_))
        ));
    }
}
