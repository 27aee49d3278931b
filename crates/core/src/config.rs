//! TOML-based configuration.
//!
//! The config file only covers the management API endpoint; the directory
//! connection settings are read at runtime from the platform's
//! `activedirectory` auth-config record. Sensitive values are stored as
//! `_env` fields that reference environment variable names and are resolved
//! at runtime via [`AppConfig::resolve_env_vars`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Management API settings.
    pub api: ApiConfig,
}

/// Management API endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the management server, e.g. `https://mgmt.example.com`.
    pub server: String,

    /// Name of the environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Resolved bearer token (not serialized).
    #[serde(skip)]
    pub token: Option<String>,

    /// Optional PEM file appended to the trust roots for the API endpoint.
    #[serde(default)]
    pub ca_cert_file: Option<String>,

    /// Skip TLS verification. For lab environments only.
    #[serde(default)]
    pub insecure: bool,
}

fn default_token_env() -> String {
    "ADMIGRATE_TOKEN".into()
}

impl AppConfig {
    /// Load the configuration from a TOML file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve `_env` references into their runtime values.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        match std::env::var(&self.api.token_env) {
            Ok(token) => {
                self.api.token = Some(token);
                Ok(())
            }
            Err(_) => Err(ConfigError::EnvVarMissing {
                var: self.api.token_env.clone(),
                field: "api.token_env".into(),
            }),
        }
    }

    /// Validate field values. Called before any API round-trip.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.server.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api.server".into(),
                detail: "server URL must not be empty".into(),
            });
        }
        if !self.api.server.starts_with("http://") && !self.api.server.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "api.server".into(),
                detail: "server URL must start with http:// or https://".into(),
            });
        }
        if let Some(ref ca) = self.api.ca_cert_file {
            if !Path::new(ca).exists() {
                return Err(ConfigError::InvalidValue {
                    field: "api.ca_cert_file".into(),
                    detail: format!("file not found: {ca}"),
                });
            }
        }

        info!(server = %self.api.server, "configuration validated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_load_and_validate() {
        let f = write_config(
            r#"
[api]
server = "https://mgmt.example.com"
token_env = "TEST_ADMIGRATE_TOKEN"
"#,
        );

        let config = AppConfig::load_from_file(f.path()).unwrap();
        assert_eq!(config.api.server, "https://mgmt.example.com");
        assert_eq!(config.api.token_env, "TEST_ADMIGRATE_TOKEN");
        assert!(config.api.token.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load_from_file("/nonexistent/admigrate.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_invalid_server_rejected() {
        let f = write_config(
            r#"
[api]
server = "mgmt.example.com"
"#,
        );
        let config = AppConfig::load_from_file(f.path()).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
