//! Configuration for fixture-registry

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::RegistryError;

/// Default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fixture-registry")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the SQLite database and config.toml
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// SQLite file name inside `data_dir`
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Maximum pooled SQLite connections
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    #[serde(default)]
    pub certification: CertificationConfig,

    #[serde(default)]
    pub similarity: SimilarityConfig,

    #[serde(default)]
    pub pagination: PaginationConfig,
}

/// Defaults applied when a certify request omits its policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CertificationConfig {
    /// Approval percentage every category must reach
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Votes each category needs before it counts
    #[serde(default = "default_min_votes")]
    pub min_votes_per_category: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimilarityConfig {
    #[serde(default = "default_similar_limit")]
    pub default_limit: usize,

    #[serde(default = "default_similar_max")]
    pub max_limit: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_per_page")]
    pub default_per_page: i64,

    #[serde(default = "default_max_per_page")]
    pub max_per_page: i64,
}

fn default_database_file() -> String {
    "registry.db".to_string()
}

fn default_http_port() -> u16 {
    8095
}

fn default_pool_size() -> u32 {
    8
}

fn default_threshold() -> f64 {
    90.0
}

fn default_min_votes() -> i64 {
    5
}

fn default_similar_limit() -> usize {
    10
}

fn default_similar_max() -> usize {
    50
}

fn default_per_page() -> i64 {
    24
}

fn default_max_per_page() -> i64 {
    100
}

impl Default for CertificationConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            min_votes_per_category: default_min_votes(),
        }
    }
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            default_limit: default_similar_limit(),
            max_limit: default_similar_max(),
        }
    }
}

impl SimilarityConfig {
    /// Resolve a requested limit against the configured default and ceiling
    pub fn resolve_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_per_page: default_per_page(),
            max_per_page: default_max_per_page(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            http_port: default_http_port(),
            pool_size: default_pool_size(),
            certification: CertificationConfig::default(),
            similarity: SimilarityConfig::default(),
            pagination: PaginationConfig::default(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| RegistryError::Config(e.to_string()))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RegistryError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| RegistryError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check values that serde defaults cannot guard
    pub fn validate(&self) -> Result<(), RegistryError> {
        if !(0.0..=100.0).contains(&self.certification.threshold) {
            return Err(RegistryError::Config(format!(
                "certification.threshold must be within 0..=100, got {}",
                self.certification.threshold
            )));
        }
        if self.certification.min_votes_per_category < 0 {
            return Err(RegistryError::Config(
                "certification.min_votes_per_category must not be negative".into(),
            ));
        }
        if self.pool_size == 0 {
            return Err(RegistryError::Config("pool_size must be at least 1".into()));
        }
        Ok(())
    }

    /// Get SQLite database path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            http_port = 9000

            [certification]
            threshold = 85.0
            "#,
        )
        .unwrap();

        assert_eq!(config.http_port, 9000);
        assert_eq!(config.certification.threshold, 85.0);
        assert_eq!(config.certification.min_votes_per_category, 5);
        assert_eq!(config.similarity.default_limit, 10);
        assert_eq!(config.database_file, "registry.db");
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = Config::default();
        config.certification.threshold = 120.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_limit_clamps() {
        let sim = SimilarityConfig::default();
        assert_eq!(sim.resolve_limit(None), 10);
        assert_eq!(sim.resolve_limit(Some(0)), 1);
        assert_eq!(sim.resolve_limit(Some(500)), 50);
    }

    #[test]
    fn test_save_and_load_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.http_port = 8123;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.http_port, 8123);
    }
}
