//! Configuration for the cyberkg bundle importer.

use serde::Deserialize;

/// Importer settings.
///
/// Loaded from the `[import]` section of `cyberkg.toml` or
/// `CYBERKG__IMPORT__` environment variables.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ImportConfig {
    /// Nodes per write call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Node batches allowed in flight at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_batches: usize,

    /// Kill-chain name whose phases are joined to tactics.
    #[serde(default = "default_kill_chain_name")]
    pub kill_chain_name: String,

    /// Refuse to import into a store that already holds nodes.
    #[serde(default = "default_true")]
    pub require_empty_store: bool,

    /// Truncate descriptions to this many characters. Unset keeps them whole.
    #[serde(default)]
    pub max_text_len: Option<usize>,
}

fn default_batch_size() -> usize {
    100
}

fn default_max_concurrent() -> usize {
    4
}

fn default_kill_chain_name() -> String {
    "mitre-attack".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_concurrent_batches: default_max_concurrent(),
            kill_chain_name: default_kill_chain_name(),
            require_empty_store: default_true(),
            max_text_len: None,
        }
    }
}

impl ImportConfig {
    /// Batch size and concurrency clamped to at least one.
    pub(crate) fn normalized(mut self) -> Self {
        self.batch_size = self.batch_size.max(1);
        self.max_concurrent_batches = self.max_concurrent_batches.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ImportConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_concurrent_batches, 4);
        assert_eq!(config.kill_chain_name, "mitre-attack");
        assert!(config.require_empty_store);
        assert_eq!(config.max_text_len, None);
    }

    #[test]
    fn test_section_overrides() {
        let cfg = config::Config::builder()
            .set_override("import.batch_size", 25)
            .unwrap()
            .set_override("import.max_text_len", 2000)
            .unwrap()
            .build()
            .unwrap();
        let import: ImportConfig = cyberkg_core::config::section(&cfg, "import").unwrap();
        assert_eq!(import.batch_size, 25);
        assert_eq!(import.max_text_len, Some(2000));
        assert_eq!(import.kill_chain_name, "mitre-attack");
    }

    #[test]
    fn test_zero_sizes_are_clamped() {
        let config = ImportConfig {
            batch_size: 0,
            max_concurrent_batches: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.max_concurrent_batches, 1);
    }
}
