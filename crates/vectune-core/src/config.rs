//! Configuration module for Vectune
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all optional values. Every threshold used by the
//! control loop lives here so a deployment can retune it without a rebuild.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TuneError};

/// Main configuration structure for Vectune
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Issue detection thresholds
    pub detection: DetectionConfig,

    /// Decision engine thresholds and oracle timeout
    pub decision: DecisionConfig,

    /// Index construction parameters
    pub index: IndexConfig,

    /// Cycle orchestration settings
    pub controller: ControllerConfig,

    /// Storage engine selection and connection
    pub storage: StorageConfig,

    /// Embedding provider
    pub embedding: EmbeddingConfig,

    /// Advisory oracle
    pub oracle: OracleConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TuneError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::parse_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn parse_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| TuneError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let d = &self.detection;
        if d.high_execution_ms < 0.0 || d.coarse_latency_ms < 0.0 {
            return Err(TuneError::Config(
                "Latency thresholds cannot be negative".to_string(),
            ));
        }
        if !(d.low_selectivity_ratio > 0.0 && d.low_selectivity_ratio <= 1.0) {
            return Err(TuneError::Config(
                "detection.low_selectivity_ratio must be in (0, 1]".to_string(),
            ));
        }

        let dec = &self.decision;
        if dec.medium_confidence_ms > dec.high_confidence_ms {
            return Err(TuneError::Config(
                "decision.medium_confidence_ms cannot exceed decision.high_confidence_ms"
                    .to_string(),
            ));
        }
        if dec.oracle_timeout_ms == 0 {
            return Err(TuneError::Config(
                "decision.oracle_timeout_ms cannot be 0".to_string(),
            ));
        }

        self.index.validate()?;

        if self.controller.result_limit == 0 {
            return Err(TuneError::Config(
                "controller.result_limit cannot be 0".to_string(),
            ));
        }
        if self.controller.storage_timeout_ms == 0 {
            return Err(TuneError::Config(
                "controller.storage_timeout_ms cannot be 0".to_string(),
            ));
        }

        if self.embedding.dimension == 0 {
            return Err(TuneError::Config(
                "embedding.dimension cannot be 0".to_string(),
            ));
        }
        if self.embedding.provider == EmbeddingProviderType::Ollama
            && self.embedding.endpoint.is_empty()
        {
            return Err(TuneError::Config(
                "embedding.endpoint is required for the ollama provider".to_string(),
            ));
        }
        if self.oracle.enabled && self.oracle.endpoint.is_empty() {
            return Err(TuneError::Config(
                "oracle.endpoint is required when the oracle is enabled".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(TuneError::Config(format!("Unknown log level: {}", other))),
        }
    }

    /// Write configuration to a TOML file
    ///
    /// Uses atomic write (temp file + rename) to prevent corruption.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| TuneError::Config(format!("Failed to serialize config: {}", e)))?;

        let temp_path = path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_str).map_err(|e| {
            TuneError::Config(format!("Failed to write temp config file: {}", e))
        })?;

        std::fs::rename(&temp_path, path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            TuneError::Config(format!("Failed to rename config file: {}", e))
        })?;

        Ok(())
    }

    /// Get a config parameter by dotted path (e.g. "detection.high_execution_ms").
    ///
    /// Returns the value as a string, or None if the parameter doesn't exist.
    pub fn get_param(&self, path: &str) -> Option<String> {
        let tree = toml::Value::try_from(self).ok()?;
        let value = path.split('.').try_fold(&tree, |node, key| node.get(key))?;
        match value {
            toml::Value::String(s) => Some(s.clone()),
            toml::Value::Table(_) | toml::Value::Array(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a config parameter by dotted path.
    ///
    /// The new value is parsed with the type of the value it replaces, and the
    /// whole document must still deserialize afterwards (so enum fields only
    /// accept their known variants).
    pub fn set_param(&mut self, path: &str, value: &str) -> Result<()> {
        let mut tree = toml::Value::try_from(&*self)
            .map_err(|e| TuneError::Config(format!("Failed to serialize config: {}", e)))?;

        let unknown = || TuneError::Config(format!("Unknown config key: {}", path));
        let slot = path
            .split('.')
            .try_fold(&mut tree, |node, key| node.get_mut(key))
            .ok_or_else(unknown)?;

        let replacement = match slot {
            toml::Value::String(_) => toml::Value::String(value.to_string()),
            toml::Value::Integer(_) => toml::Value::Integer(value.parse().map_err(|_| {
                TuneError::Config(format!("Invalid integer value for {}: {}", path, value))
            })?),
            toml::Value::Float(_) => toml::Value::Float(value.parse().map_err(|_| {
                TuneError::Config(format!("Invalid float value for {}: {}", path, value))
            })?),
            toml::Value::Boolean(_) => toml::Value::Boolean(value.parse().map_err(|_| {
                TuneError::Config(format!("Invalid boolean value for {}: {}", path, value))
            })?),
            _ => return Err(unknown()),
        };
        *slot = replacement;

        *self = tree
            .try_into()
            .map_err(|e| TuneError::Config(format!("Invalid value for {}: {}", path, e)))?;
        Ok(())
    }
}

/// Thresholds for [`IssueDetector`](crate::detector::IssueDetector) and the
/// orchestrator's coarse gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Rows scanned above which a sequential scan counts as a large dataset
    pub large_dataset_rows: u64,
    /// Execution time (ms) above which HIGH_EXECUTION_TIME is raised
    pub high_execution_ms: f64,
    /// Rows scanned above which a missing index is reported
    pub no_index_rows: u64,
    /// Returned/scanned ratio below which selectivity is low
    pub low_selectivity_ratio: f64,
    /// Minimum rows scanned for the low-selectivity rule to apply
    pub low_selectivity_min_rows: u64,
    /// Execution time (ms) above which the coarse `high_latency` gate opens
    pub coarse_latency_ms: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            large_dataset_rows: 1000,
            high_execution_ms: 100.0,
            no_index_rows: 500,
            low_selectivity_ratio: 0.1,
            low_selectivity_min_rows: 1000,
            coarse_latency_ms: 20.0,
        }
    }
}

/// Thresholds for [`DecisionEngine`](crate::decision::DecisionEngine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Execution time (ms) above which confidence is high
    pub high_confidence_ms: f64,
    /// Execution time (ms) above which confidence is medium
    pub medium_confidence_ms: f64,
    /// Execution time (ms) above which the fallback rule creates an index
    pub fallback_execution_ms: f64,
    /// Rows scanned below which the fallback rule prefers HNSW over IVFFlat
    pub hnsw_max_rows: u64,
    /// Upper bound for one advisory oracle call
    pub oracle_timeout_ms: u64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            high_confidence_ms: 200.0,
            medium_confidence_ms: 100.0,
            fallback_execution_ms: 100.0,
            hnsw_max_rows: 100_000,
            oracle_timeout_ms: 30_000,
        }
    }
}

impl DecisionConfig {
    /// Oracle timeout as a [`Duration`]
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }
}

/// Index construction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Qualified table holding the vectors
    pub table: String,
    /// Vector column
    pub column: String,
    /// pgvector operator class
    pub operator_class: String,
    /// HNSW max connections per layer
    pub hnsw_m: u32,
    /// HNSW candidate list size during construction
    pub hnsw_ef_construction: u32,
    /// IVFFlat inverted list count
    pub ivfflat_lists: u32,
    /// Upper bound for one index build, separate from the storage timeout
    pub build_timeout_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            table: "rag_system.documents".to_string(),
            column: "embedding".to_string(),
            operator_class: "vector_cosine_ops".to_string(),
            hnsw_m: 16,
            hnsw_ef_construction: 64,
            ivfflat_lists: 100,
            build_timeout_ms: 3_600_000,
        }
    }
}

impl IndexConfig {
    fn validate(&self) -> Result<()> {
        let identifier = |s: &str| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        };
        if !identifier(&self.table) || !identifier(&self.column) || !identifier(&self.operator_class)
        {
            return Err(TuneError::Config(
                "index.table, index.column and index.operator_class must be plain identifiers"
                    .to_string(),
            ));
        }
        if self.hnsw_m < 2 {
            return Err(TuneError::Config("index.hnsw_m must be at least 2".to_string()));
        }
        if self.hnsw_ef_construction < 2 * self.hnsw_m {
            return Err(TuneError::Config(
                "index.hnsw_ef_construction must be at least twice index.hnsw_m".to_string(),
            ));
        }
        if self.ivfflat_lists == 0 {
            return Err(TuneError::Config(
                "index.ivfflat_lists cannot be 0".to_string(),
            ));
        }
        if self.build_timeout_ms == 0 {
            return Err(TuneError::Config(
                "index.build_timeout_ms cannot be 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Schema the indexes land in: the table's schema, `public` when unqualified.
    pub fn schema(&self) -> &str {
        self.table
            .split_once('.')
            .map(|(schema, _)| schema)
            .unwrap_or("public")
    }

    /// Index build timeout as a [`Duration`]
    pub fn build_timeout(&self) -> Duration {
        Duration::from_millis(self.build_timeout_ms)
    }
}

/// Cycle orchestration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Wait after index creation before re-observing
    pub settle_interval_ms: u64,
    /// Upper bound for every storage engine call
    pub storage_timeout_ms: u64,
    /// Execution time reported by a degraded observation
    pub degraded_execution_ms: f64,
    /// Label of the observed query
    pub query_name: String,
    /// LIMIT of the nearest-neighbour query
    pub result_limit: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            settle_interval_ms: 2000,
            storage_timeout_ms: 10_000,
            degraded_execution_ms: 100.0,
            query_name: "Vector Similarity Search".to_string(),
            result_limit: 5,
        }
    }
}

impl ControllerConfig {
    /// Settling interval as a [`Duration`]
    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }

    /// Storage call timeout as a [`Duration`]
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }
}

/// Storage engine backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process simulated vector table
    #[default]
    Simulated,
    /// PostgreSQL with pgvector
    Postgres,
}

/// Storage engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Which backend to use
    pub backend: StorageBackend,
    /// PostgreSQL connection parameters
    pub postgres: PostgresConfig,
    /// Simulated engine seed
    pub simulated: SimulatedConfig,
}

/// PostgreSQL connection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Role
    pub user: String,
    /// Password
    pub password: String,
    /// Schema holding the registry and log tables
    pub schema: String,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "vector_store".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            schema: "rag_system".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl PostgresConfig {
    /// libpq-style connection string
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={} connect_timeout={}",
            self.host, self.port, self.dbname, self.user, self.password, self.connect_timeout_secs
        )
    }
}

/// Seed for the simulated engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedConfig {
    /// Number of stored vectors
    pub row_count: u64,
    /// Sequential scan cost per row in milliseconds
    pub seq_scan_ms_per_row: f64,
    /// Cost of an index scan in milliseconds
    pub index_scan_ms: f64,
    /// Planning time in milliseconds
    pub planning_ms: f64,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            row_count: 40_000,
            seq_scan_ms_per_row: 0.0045,
            index_scan_ms: 1.8,
            planning_ms: 0.12,
        }
    }
}

/// Embedding provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderType {
    /// Deterministic hash-based vectors
    #[default]
    Hash,
    /// Ollama embeddings endpoint
    Ollama,
}

/// Embedding provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider type
    pub provider: EmbeddingProviderType,
    /// Model name
    pub model: String,
    /// API endpoint
    pub endpoint: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Request timeout
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::Hash,
            model: "all-minilm".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            dimension: 384,
            timeout_secs: 30,
        }
    }
}

/// Advisory oracle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Consult the oracle at all (the rule-based fallback is used otherwise)
    pub enabled: bool,
    /// Model name
    pub model: String,
    /// API endpoint
    pub endpoint: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens in the reply
    pub max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "phi3:mini".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            temperature: 0.3,
            max_tokens: 500,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,

    /// JSON format
    Json,
}
