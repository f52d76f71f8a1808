//! Configuration discovery and wiring of the collaborators.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use vectune_core::config::{Config, StorageBackend};
use vectune_core::storage::{SimulatedEngine, StorageEngine};
use vectune_core::{embedding, oracle, CycleOrchestrator, Result, TuneError};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "vectune.toml";

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    DefaultFile(PathBuf),
    Defaults,
}

impl ConfigSource {
    pub fn label(&self) -> String {
        match self {
            ConfigSource::Explicit(path) | ConfigSource::DefaultFile(path) => {
                path.display().to_string()
            }
            ConfigSource::Defaults => "built-in defaults".to_string(),
        }
    }
}

/// Load `explicit` if given, else `./vectune.toml` if present, else defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<(Config, ConfigSource)> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(TuneError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let config = Config::from_file(path)?;
        return Ok((config, ConfigSource::Explicit(path.to_path_buf())));
    }

    let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        let config = Config::from_file(&default_path)?;
        return Ok((config, ConfigSource::DefaultFile(default_path)));
    }

    Ok((Config::default(), ConfigSource::Defaults))
}

/// Apply command line overrides, then validate the result.
///
/// `overrides` are `key=value` pairs with dotted keys.
pub fn apply_overrides(
    config: &mut Config,
    log_level: Option<&str>,
    overrides: &[String],
) -> Result<()> {
    if let Some(level) = log_level {
        config.logging.level = level.to_string();
    }

    for override_str in overrides {
        let (key, value) = override_str.split_once('=').ok_or_else(|| {
            TuneError::Config(format!(
                "Invalid config override '{}': expected key=value format",
                override_str
            ))
        })?;
        config.set_param(key.trim(), value.trim())?;
    }

    config.validate()
}

/// Open the configured storage engine.
pub async fn connect_storage(config: &Config) -> Result<Arc<dyn StorageEngine>> {
    match config.storage.backend {
        StorageBackend::Simulated => {
            info!(
                rows = config.storage.simulated.row_count,
                "Using simulated storage engine"
            );
            Ok(Arc::new(SimulatedEngine::new(
                config.storage.simulated.clone(),
            )))
        }
        #[cfg(feature = "postgres")]
        StorageBackend::Postgres => {
            let engine = vectune_core::storage::PostgresEngine::connect(
                &config.storage.postgres,
                &config.index,
            )
            .await?;
            engine.ensure_schema().await?;
            Ok(Arc::new(engine))
        }
        #[cfg(not(feature = "postgres"))]
        StorageBackend::Postgres => Err(TuneError::Config(
            "storage.backend = \"postgres\" requires the postgres feature".to_string(),
        )),
    }
}

/// Build an orchestrator with every collaborator the configuration selects.
pub async fn build_orchestrator(config: &Config) -> Result<CycleOrchestrator> {
    let storage = connect_storage(config).await?;
    let embedder = embedding::from_config(&config.embedding);
    let advisor = oracle::from_config(&config.oracle);

    info!(
        storage = storage.name(),
        embedder = embedder.name(),
        dimension = embedder.dimension(),
        advisor = advisor.as_ref().map(|a| a.name()).unwrap_or("none"),
        "Controller ready"
    );

    Ok(CycleOrchestrator::new(config, embedder, storage, advisor))
}
