//! Configuration types for har-replay

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{ReplayError, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Port to serve replayed responses on
    pub port: u16,
    /// Archive files to index at startup, in merge order
    pub archives: Vec<PathBuf>,
    /// Resource limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Resource limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum headers per request
    pub max_headers: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_headers: 128 }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReplayError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ReplayError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ReplayError::ConfigError("port cannot be 0".to_string()));
        }

        if self.archives.is_empty() {
            return Err(ReplayError::ConfigError(
                "At least one archive must be configured".to_string(),
            ));
        }

        for archive in &self.archives {
            if !archive.exists() {
                return Err(ReplayError::ConfigError(format!(
                    "Archive does not exist: {}",
                    archive.display()
                )));
            }
        }

        if self.limits.max_headers == 0 {
            return Err(ReplayError::ConfigError(
                "max_headers must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parse() {
        let config_toml = r#"
            port = 8080
            archives = ["/tmp/session.har"]
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.archives.len(), 1);
        assert_eq!(config.limits.max_headers, 128);
    }

    #[test]
    fn test_config_from_file() {
        let mut archive = NamedTempFile::new().unwrap();
        archive.write_all(b"{}").unwrap();

        let mut file = NamedTempFile::new().unwrap();
        let config_toml = format!(
            "port = 9090\narchives = [{:?}]\n",
            archive.path().to_str().unwrap()
        );
        file.write_all(config_toml.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn test_invalid_config_no_archives() {
        let config_toml = r#"
            port = 8080
            archives = []
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_config_zero_port() {
        let config_toml = r#"
            port = 0
            archives = ["/tmp/session.har"]
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_config_missing_archive() {
        let config_toml = r#"
            port = 8080
            archives = ["/nonexistent/capture.har"]
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert!(config.validate().is_err());
    }
}
