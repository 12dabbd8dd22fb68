//! Engine configuration via `tessera.toml`
//!
//! A missing section or field falls back to its default, so the smallest
//! valid file is the empty file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use tessera_core::Limits;

use crate::error::{Error, Result};

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "tessera.toml";

/// Session registry settings (`[session]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Evict sessions unused for this many seconds; 0 disables idle eviction.
    pub idle_ttl_secs: u64,
    /// Maximum live tenant sessions; least recently used are evicted first.
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            idle_ttl_secs: 300,
            max_sessions: 1000,
        }
    }
}

impl SessionConfig {
    /// Idle timeout, `None` when disabled.
    pub fn idle_ttl(&self) -> Option<Duration> {
        (self.idle_ttl_secs > 0).then(|| Duration::from_secs(self.idle_ttl_secs))
    }
}

/// Hybrid search fusion settings (`[hybrid]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    /// Reciprocal rank fusion smoothing constant
    pub rrf_k: f32,
    /// Weight of the vector ranking
    pub vector_weight: f32,
    /// Weight of the lexical ranking
    pub lexical_weight: f32,
}

impl Default for HybridConfig {
    fn default() -> Self {
        HybridConfig {
            rrf_k: 60.0,
            vector_weight: 1.0,
            lexical_weight: 1.0,
        }
    }
}

fn default_max_conditional_attempts() -> usize {
    3
}

/// Engine configuration loaded from `tessera.toml`.
///
/// # Example
///
/// ```toml
/// max_conditional_attempts = 3
///
/// [limits]
/// max_collections = 5
///
/// [session]
/// idle_ttl_secs = 300
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-tenant caps and size limits
    #[serde(default)]
    pub limits: Limits,
    /// Session registry settings
    #[serde(default)]
    pub session: SessionConfig,
    /// Attempts per conditional write before reporting contention
    #[serde(default = "default_max_conditional_attempts")]
    pub max_conditional_attempts: usize,
    /// Hybrid search fusion settings
    #[serde(default)]
    pub hybrid: HybridConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            limits: Limits::default(),
            session: SessionConfig::default(),
            max_conditional_attempts: default_max_conditional_attempts(),
            hybrid: HybridConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Config with small limits, for tests.
    pub fn with_small_limits() -> Self {
        EngineConfig {
            limits: Limits::with_small_limits(),
            ..Default::default()
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: &str| {
            Err(Error::Config {
                reason: reason.to_string(),
            })
        };
        if self.max_conditional_attempts == 0 {
            return fail("max_conditional_attempts must be at least 1");
        }
        if self.limits.default_page_size == 0
            || self.limits.default_page_size > self.limits.max_page_size
        {
            return fail("limits.default_page_size must be between 1 and limits.max_page_size");
        }
        if !(self.hybrid.rrf_k > 0.0) {
            return fail("hybrid.rrf_k must be positive");
        }
        if self.hybrid.vector_weight < 0.0 || self.hybrid.lexical_weight < 0.0 {
            return fail("hybrid weights must not be negative");
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Tessera engine configuration
#
# Attempts per conditional write (update/delete) before the command fails
# with CONCURRENCY_FAILURE.
max_conditional_attempts = 3

[limits]
# Per tenant database
max_collections = 5
max_indexes = 50
# Request and document size in bytes
max_request_bytes = 16777216
max_document_bytes = 4194304
max_vector_dimension = 4096
# Result sizes
max_page_size = 1000
default_page_size = 20
max_sort_read = 10000
max_in_values = 100
max_documents_per_insert = 100
max_documents_per_delete = 20
max_count = 1000

[session]
# 0 disables idle eviction
idle_ttl_secs = 300
max_sessions = 1000

[hybrid]
rrf_k = 60.0
vector_weight = 1.0
lexical_weight = 1.0
"#
    }

    /// Parse and validate config text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content).map_err(|e| Error::Config {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config { reason } => Error::Config {
                reason: format!("config file '{}': {}", path.display(), reason),
            },
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| Error::Config {
                reason: format!(
                    "failed to write default config file '{}': {}",
                    path.display(),
                    e
                ),
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config {
            reason: format!("failed to serialize config: {}", e),
        })?;
        std::fs::write(path, content).map_err(|e| Error::Config {
            reason: format!("failed to write config file '{}': {}", path.display(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_toml_parses_to_default_config() {
        let parsed = EngineConfig::from_toml_str(EngineConfig::default_toml()).unwrap();
        assert_eq!(parsed, EngineConfig::default());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let parsed = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(parsed.max_conditional_attempts, 3);
        assert_eq!(parsed.limits.max_collections, 5);
        assert_eq!(parsed.session.idle_ttl(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn partial_section_overrides_only_named_fields() {
        let parsed = EngineConfig::from_toml_str("[limits]\nmax_collections = 2\n").unwrap();
        assert_eq!(parsed.limits.max_collections, 2);
        assert_eq!(parsed.limits.max_indexes, 50);
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = EngineConfig::from_toml_str("max_conditional_attempts = 0").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn zero_ttl_disables_idle_eviction() {
        let parsed = EngineConfig::from_toml_str("[session]\nidle_ttl_secs = 0\n").unwrap();
        assert_eq!(parsed.session.idle_ttl(), None);
    }

    #[test]
    fn write_default_then_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        EngineConfig::write_default_if_missing(&path).unwrap();
        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "max_conditional_attempts = 7\n").unwrap();
        EngineConfig::write_default_if_missing(&path).unwrap();
        assert_eq!(EngineConfig::from_file(&path).unwrap().max_conditional_attempts, 7);
    }

    #[test]
    fn write_to_file_round_trips_custom_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut config = EngineConfig::with_small_limits();
        config.hybrid.vector_weight = 2.0;
        config.write_to_file(&path).unwrap();
        assert_eq!(EngineConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = EngineConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIGURATION");
    }
}
