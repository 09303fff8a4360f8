//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::cache::{CacheConfig, MAX_TTL};
use crate::domain::graph::{DeletePolicy, StoreOptions};
use crate::domain::import::ImportOptions;
use crate::domain::query::{PathOptions, SubgraphOptions};
use crate::storage::default_database_path;

/// Cairn configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub cache: CacheSettings,
    pub query: QueryConfig,
    pub import: ImportConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Graph database file; the platform data dir when unset
    pub database_path: Option<PathBuf>,
    pub enforce_unique_relationships: bool,
    pub delete_policy: DeletePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_entries: usize,
    pub default_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    /// Write cache entries through to the database
    pub persist: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_depth: usize,
    pub default_max_nodes: usize,
    pub path_max_depth: usize,
    pub suggestion_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub concurrency: usize,
    pub min_content_length: usize,
    pub convert_wikilinks: bool,
    pub convert_callouts: bool,
    pub preserve_frontmatter: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            max_entries: defaults.max_entries,
            default_ttl_secs: defaults.default_ttl.as_secs(),
            sweep_interval_secs: defaults.sweep_interval.as_secs(),
            persist: false,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        let subgraph = SubgraphOptions::default();
        Self {
            default_depth: subgraph.depth,
            default_max_nodes: subgraph.max_nodes,
            path_max_depth: PathOptions::default().max_depth,
            suggestion_limit: 10,
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        let defaults = ImportOptions::default();
        Self {
            concurrency: defaults.concurrency,
            min_content_length: defaults.min_content_length,
            convert_wikilinks: defaults.convert_wikilinks,
            convert_callouts: defaults.convert_callouts,
            preserve_frontmatter: defaults.preserve_frontmatter,
        }
    }
}

impl StoreConfig {
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(default_database_path)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            enforce_unique_relationships: self.enforce_unique_relationships,
            delete_policy: self.delete_policy,
        }
    }
}

impl CacheSettings {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.max_entries,
            default_ttl: Duration::from_secs(self.default_ttl_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }
}

impl QueryConfig {
    pub fn subgraph_options(&self) -> SubgraphOptions {
        SubgraphOptions::new(self.default_depth, self.default_max_nodes)
    }

    pub fn path_options(&self, weighted: bool) -> PathOptions {
        if weighted {
            PathOptions::weighted(self.path_max_depth)
        } else {
            PathOptions::shortest(self.path_max_depth)
        }
    }
}

impl ImportConfig {
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            concurrency: self.concurrency,
            min_content_length: self.min_content_length,
            convert_wikilinks: self.convert_wikilinks,
            convert_callouts: self.convert_callouts,
            preserve_frontmatter: self.preserve_frontmatter,
        }
    }
}

const KEYS: &[&str] = &[
    "store.database_path",
    "store.enforce_unique_relationships",
    "store.delete_policy",
    "cache.max_entries",
    "cache.default_ttl_secs",
    "cache.sweep_interval_secs",
    "cache.persist",
    "query.default_depth",
    "query.default_max_nodes",
    "query.path_max_depth",
    "query.suggestion_limit",
    "import.concurrency",
    "import.min_content_length",
    "import.convert_wikilinks",
    "import.convert_callouts",
    "import.preserve_frontmatter",
];

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("CAIRN_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("cairn")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            // Return default config without creating file
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cache.max_entries == 0 {
            return Err(anyhow!("cache.max_entries must be at least 1"));
        }
        if self.cache.default_ttl_secs == 0 {
            return Err(anyhow!("cache.default_ttl_secs must be at least 1"));
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err(anyhow!("cache.sweep_interval_secs must be at least 1"));
        }
        for (key, secs) in [
            ("cache.default_ttl_secs", self.cache.default_ttl_secs),
            ("cache.sweep_interval_secs", self.cache.sweep_interval_secs),
        ] {
            if secs > MAX_TTL.as_secs() {
                return Err(anyhow!("{} must be at most {}", key, MAX_TTL.as_secs()));
            }
        }
        if self.query.default_max_nodes == 0 {
            return Err(anyhow!("query.default_max_nodes must be at least 1"));
        }
        if self.query.suggestion_limit == 0 {
            return Err(anyhow!("query.suggestion_limit must be at least 1"));
        }
        if self.import.concurrency == 0 {
            return Err(anyhow!("import.concurrency must be at least 1"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            // Store settings
            "store.database_path" => Ok(self.store.database_path().display().to_string()),
            "store.enforce_unique_relationships" => {
                Ok(self.store.enforce_unique_relationships.to_string())
            }
            "store.delete_policy" => Ok(self.store.delete_policy.as_str().to_string()),

            // Cache settings
            "cache.max_entries" => Ok(self.cache.max_entries.to_string()),
            "cache.default_ttl_secs" => Ok(self.cache.default_ttl_secs.to_string()),
            "cache.sweep_interval_secs" => Ok(self.cache.sweep_interval_secs.to_string()),
            "cache.persist" => Ok(self.cache.persist.to_string()),

            // Query settings
            "query.default_depth" => Ok(self.query.default_depth.to_string()),
            "query.default_max_nodes" => Ok(self.query.default_max_nodes.to_string()),
            "query.path_max_depth" => Ok(self.query.path_max_depth.to_string()),
            "query.suggestion_limit" => Ok(self.query.suggestion_limit.to_string()),

            // Import settings
            "import.concurrency" => Ok(self.import.concurrency.to_string()),
            "import.min_content_length" => Ok(self.import.min_content_length.to_string()),
            "import.convert_wikilinks" => Ok(self.import.convert_wikilinks.to_string()),
            "import.convert_callouts" => Ok(self.import.convert_callouts.to_string()),
            "import.preserve_frontmatter" => Ok(self.import.preserve_frontmatter.to_string()),

            _ => Err(unknown_key(key)),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            // Store settings
            "store.database_path" => {
                let value = value.trim();
                self.store.database_path = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "store.enforce_unique_relationships" => {
                self.store.enforce_unique_relationships = parse_bool(key, value)?;
            }
            "store.delete_policy" => {
                self.store.delete_policy = DeletePolicy::parse(value).ok_or_else(|| {
                    anyhow!("Invalid delete policy: {}. Valid options: cascade, reject", value)
                })?;
            }

            // Cache settings
            "cache.max_entries" => {
                self.cache.max_entries = parse_positive(key, value)?;
            }
            "cache.default_ttl_secs" => {
                self.cache.default_ttl_secs = parse_seconds(key, value)?;
            }
            "cache.sweep_interval_secs" => {
                self.cache.sweep_interval_secs = parse_seconds(key, value)?;
            }
            "cache.persist" => {
                self.cache.persist = parse_bool(key, value)?;
            }

            // Query settings
            "query.default_depth" => {
                self.query.default_depth = value
                    .parse()
                    .with_context(|| format!("Invalid default_depth value: {}", value))?;
            }
            "query.default_max_nodes" => {
                self.query.default_max_nodes = parse_positive(key, value)?;
            }
            "query.path_max_depth" => {
                self.query.path_max_depth = value
                    .parse()
                    .with_context(|| format!("Invalid path_max_depth value: {}", value))?;
            }
            "query.suggestion_limit" => {
                self.query.suggestion_limit = parse_positive(key, value)?;
            }

            // Import settings
            "import.concurrency" => {
                self.import.concurrency = parse_positive(key, value)?;
            }
            "import.min_content_length" => {
                self.import.min_content_length = value
                    .parse()
                    .with_context(|| format!("Invalid min_content_length value: {}", value))?;
            }
            "import.convert_wikilinks" => {
                self.import.convert_wikilinks = parse_bool(key, value)?;
            }
            "import.convert_callouts" => {
                self.import.convert_callouts = parse_bool(key, value)?;
            }
            "import.preserve_frontmatter" => {
                self.import.preserve_frontmatter = parse_bool(key, value)?;
            }

            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        KEYS.iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        Self::reset_at(&Self::config_path()?)
    }

    /// Remove a specific config file
    pub fn reset_at(path: &Path) -> anyhow::Result<()> {
        if path.exists() {
            fs::remove_file(path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn unknown_key(key: &str) -> anyhow::Error {
    anyhow!(
        "Unknown configuration key: {}. Use `cairn config list` to see available keys.",
        key
    )
}

fn parse_bool(key: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(anyhow!("Invalid {} value: {} (expected true or false)", key, value)),
    }
}

fn parse_positive(key: &str, value: &str) -> anyhow::Result<usize> {
    let parsed: usize = value
        .trim()
        .parse()
        .with_context(|| format!("Invalid {} value: {}", key, value))?;
    if parsed == 0 {
        return Err(anyhow!("{} must be at least 1", key));
    }
    Ok(parsed)
}

/// Positive second count no longer than the cache's maximum TTL
fn parse_seconds(key: &str, value: &str) -> anyhow::Result<u64> {
    let secs = parse_positive(key, value)? as u64;
    if secs > MAX_TTL.as_secs() {
        return Err(anyhow!("{} must be at most {}", key, MAX_TTL.as_secs()));
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert!(config.store.database_path.is_none());
        assert!(!config.store.enforce_unique_relationships);
        assert_eq!(config.store.delete_policy, DeletePolicy::Cascade);

        assert_eq!(config.cache.max_entries, 1000);
        assert_eq!(config.cache.default_ttl_secs, 300);
        assert_eq!(config.cache.sweep_interval_secs, 60);
        assert!(!config.cache.persist);

        assert_eq!(config.query.default_depth, 2);
        assert_eq!(config.query.default_max_nodes, 100);
        assert_eq!(config.query.path_max_depth, 5);

        assert_eq!(config.import.concurrency, 8);
        assert_eq!(config.import.min_content_length, 50);
        assert!(config.import.convert_wikilinks);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();

        config.set("store.delete_policy", "reject").unwrap();
        assert_eq!(config.get("store.delete_policy").unwrap(), "reject");

        config.set("cache.persist", "yes").unwrap();
        assert!(config.cache.persist);

        config.set("import.concurrency", "4").unwrap();
        assert_eq!(config.import.import_options().concurrency, 4);

        config.set("store.database_path", "/tmp/graph.db").unwrap();
        assert_eq!(config.store.database_path(), PathBuf::from("/tmp/graph.db"));
        config.set("store.database_path", "").unwrap();
        assert!(config.store.database_path.is_none());
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();

        assert!(config.set("store.delete_policy", "orphan").is_err());
        assert!(config.set("cache.max_entries", "0").is_err());
        assert!(config.set("cache.default_ttl_secs", "soon").is_err());
        assert!(config.set("cache.default_ttl_secs", "18446744073709551615").is_err());
        assert!(config.set("cache.sweep_interval_secs", "18446744073709551615").is_err());
        assert!(config.set("import.convert_callouts", "maybe").is_err());

        let err = config.set("nope.key", "1").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(config.get("nope.key").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_list_covers_every_key() {
        let listed = Config::default().list().unwrap();
        assert_eq!(listed.len(), KEYS.len());
        assert!(listed.iter().any(|(k, v)| k == "cache.max_entries" && v == "1000"));
    }

    #[test]
    fn test_save_load_reset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert_eq!(Config::load_from(&path).unwrap(), Config::default());

        let mut config = Config::default();
        config.set("query.suggestion_limit", "3").unwrap();
        config.set("store.enforce_unique_relationships", "true").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.query.suggestion_limit, 3);
        assert!(loaded.store.store_options().enforce_unique_relationships);

        Config::reset_at(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[cache]\nmax_entries = 5\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.cache.max_entries, 5);
        assert_eq!(config.cache.default_ttl_secs, 300);
        assert_eq!(config.import, ImportConfig::default());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[import]\nconcurrency = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());

        fs::write(&path, "[cache]\ndefault_ttl_secs = 9223372036854775807\n").unwrap();
        assert!(Config::load_from(&path).is_err());

        fs::write(&path, "not = [valid").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_sections_convert_to_domain_options() {
        let config = Config::default();
        let cache = config.cache.cache_config();
        assert_eq!(cache.default_ttl, Duration::from_secs(300));
        assert_eq!(config.query.subgraph_options().max_nodes, 100);
        assert_eq!(config.query.path_options(true).max_depth, 5);
    }
}
