//! Configuration management for cyberkg services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`CYBERKG__SECTION__KEY`)
//! 2. Config file (`cyberkg.toml`, prefix overridable per binary)
//! 3. Defaults

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::CoreError;

/// Default config file prefix (`cyberkg.toml`, `cyberkg.yaml`, ...).
pub const DEFAULT_CONFIG_PREFIX: &str = "cyberkg";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "CYBERKG";

/// Build the layered configuration for a binary.
pub fn load(file_prefix: &str) -> Result<config::Config, CoreError> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    Ok(cfg)
}

/// Deserialize one section, falling back to its defaults when absent.
///
/// A section that is present but malformed is an error.
pub fn section<T>(cfg: &config::Config, key: &str) -> Result<T, CoreError>
where
    T: DeserializeOwned + Default,
{
    match cfg.get::<T>(key) {
        Ok(value) => Ok(value),
        Err(config::ConfigError::NotFound(_)) => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

/// Connection settings for the Neo4j graph store (`[neo4j]`).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Neo4jSettings {
    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_password")]
    pub password: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "cyberkg-dev".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_section_uses_defaults() {
        let cfg = config::Config::builder().build().unwrap();
        let neo: Neo4jSettings = section(&cfg, "neo4j").unwrap();
        assert_eq!(neo, Neo4jSettings::default());
        assert_eq!(neo.max_connections, 16);
    }

    #[test]
    fn partial_section_fills_defaults() {
        let cfg = config::Config::builder()
            .set_override("neo4j.uri", "bolt://graph:7687")
            .unwrap()
            .build()
            .unwrap();
        let neo: Neo4jSettings = section(&cfg, "neo4j").unwrap();
        assert_eq!(neo.uri, "bolt://graph:7687");
        assert_eq!(neo.user, "neo4j");
        assert_eq!(neo.fetch_size, 256);
    }
}
