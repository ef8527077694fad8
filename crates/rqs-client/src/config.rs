//! Layered client settings.
//!
//! Sources are applied in order, later ones overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. `rqs.{toml,yaml,json}` in the working directory, if present
//! 3. An explicit file passed by the caller (must exist)
//! 4. Environment variables prefixed `RQS__`, e.g. `RQS__BASE_URL`
//!
//! Every field carries a serde default, so an empty environment yields a
//! usable configuration.

use crate::client::ClientConfig;
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

const ENV_PREFIX: &str = "RQS";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_FILE: &str = "rqs";

/// Deserializable client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Broker root URL
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    pub user_agent: String,

    /// Check ID-routed messages locally before publishing
    pub validate_routing: bool,

    /// Visibility timeout used when the CLI creates a queue without one
    pub default_visibility_timeout: u32,

    /// Batch size used when the CLI creates a queue without one
    pub default_max_batch: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            base_url: client.base_url,
            timeout_seconds: client.timeout.as_secs(),
            user_agent: client.user_agent,
            validate_routing: client.validate_routing,
            default_visibility_timeout: 30,
            default_max_batch: 10,
        }
    }
}

impl ClientSettings {
    /// Load settings from the default file, an optional explicit file and the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::Parsing` for an unreadable or malformed
    /// source and `ConfigurationError::Invalid` if the merged values fail
    /// validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        Self::load_with_environment(
            path,
            config::Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        )
    }

    pub(crate) fn load_with_environment(
        path: Option<&Path>,
        environment: config::Environment,
    ) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(DEFAULT_FILE).required(false));

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading client settings from file");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings: Self = builder
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigurationError::Invalid {
                message: "base_url must not be empty".to_string(),
            });
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigurationError::Invalid {
                message: "timeout_seconds must be greater than 0".to_string(),
            });
        }

        if self.default_visibility_timeout == 0 {
            return Err(ConfigurationError::Invalid {
                message: "default_visibility_timeout must be greater than 0".to_string(),
            });
        }

        if self.default_max_batch == 0 {
            return Err(ConfigurationError::Invalid {
                message: "default_max_batch must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Convert into the runtime client configuration
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_seconds),
            user_agent: self.user_agent.clone(),
            validate_routing: self.validate_routing,
        }
    }
}
