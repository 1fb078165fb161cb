use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::sift::MAX_SIFT_ITERATIONS;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct EmberConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub retrieval: RetrievalConfig,
    pub sift: SiftConfig,
    pub classifier: ClassifierConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub default_owner_scope: Option<String>,
    /// Read-only connections opened beside the writer. Zero routes every
    /// read through the writer.
    pub read_connections: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub max_memories: usize,
    pub min_score: f64,
    pub traverse_max_depth: u32,
    pub traverse_min_weight: f64,
    /// Keyword matches used as BFS starting points per graph lookup.
    pub seed_limit: usize,
    /// Whether the project category also searches the shadow layer.
    pub include_shadow: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SiftConfig {
    /// Re-query rounds; values above [`MAX_SIFT_ITERATIONS`] are clamped.
    pub max_iterations: u32,
    pub enable_requery: bool,
    /// Wall-clock budget per query. Unset means no deadline.
    pub deadline_ms: Option<u64>,
    pub verification_suffix: String,
    pub similarity_threshold: f64,
    pub min_corroboration: usize,
    /// Warn when external evidence never reaches an original source.
    pub require_original: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClassifierConfig {
    pub verification_triggers: Vec<String>,
    pub freshness_triggers: Vec<String>,
    pub high_stakes_triggers: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SourcesConfig {
    pub connected_knowledge: HttpSourceConfig,
    pub web: HttpSourceConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpSourceConfig {
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
    /// Name of the env var holding a bearer token, if the endpoint needs one.
    pub api_key_env: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            host: "127.0.0.1".into(),
            port: 7411,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_ember_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            default_owner_scope: None,
            read_connections: 4,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_memories: 10,
            min_score: 0.3,
            traverse_max_depth: 3,
            traverse_min_weight: 0.3,
            seed_limit: 5,
            include_shadow: false,
        }
    }
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_SIFT_ITERATIONS,
            enable_requery: true,
            deadline_ms: None,
            verification_suffix: "primary source verification".into(),
            similarity_threshold: 0.5,
            min_corroboration: 2,
            require_original: false,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            verification_triggers: list(&[
                "verify",
                "verified",
                "fact check",
                "is it true",
                "source",
                "sources",
                "evidence",
                "citation",
                "cite",
                "proof",
                "confirm",
            ]),
            freshness_triggers: list(&[
                "latest",
                "today",
                "current",
                "currently",
                "recent",
                "recently",
                "news",
                "now",
                "this week",
                "this year",
                "update",
            ]),
            high_stakes_triggers: list(&[
                "medical",
                "medication",
                "dosage",
                "diagnosis",
                "health",
                "legal",
                "lawsuit",
                "financial",
                "invest",
                "investment",
                "safety",
                "emergency",
            ]),
        }
    }
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 5000,
            api_key_env: None,
        }
    }
}

/// Returns `~/.ember/`, or `./.ember/` when no home directory is known.
pub fn default_ember_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ember")
}

/// Returns the default config file path: `~/.ember/config.toml`
pub fn default_config_path() -> PathBuf {
    default_ember_dir().join("config.toml")
}

impl EmberConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            EmberConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (EMBER_DB, EMBER_OWNER_SCOPE, EMBER_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("EMBER_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("EMBER_OWNER_SCOPE") {
            self.storage.default_owner_scope = Some(val).filter(|v| !v.is_empty());
        }
        if let Ok(val) = std::env::var("EMBER_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

impl SiftConfig {
    /// Configured rounds, never above [`MAX_SIFT_ITERATIONS`].
    pub fn effective_max_iterations(&self) -> u32 {
        self.max_iterations.min(MAX_SIFT_ITERATIONS)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
