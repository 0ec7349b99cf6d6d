//! Configuration loading and root folder resolution
//!
//! Every component receives its paths and tunables through [`PipelineConfig`],
//! which is built once at process start from the resolved root folder and the
//! optional TOML config file. Nothing reads ambient path state after startup.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Primary environment variable for the root folder
pub const ROOT_FOLDER_ENV: &str = "CLAIMGUARD_ROOT_FOLDER";
/// Short alias for [`ROOT_FOLDER_ENV`]
pub const ROOT_ENV: &str = "CLAIMGUARD_ROOT";
/// Base directory variable understood by older deployments
pub const LEGACY_BASE_DIR_ENV: &str = "FRAUD_BASE_DIR";

/// Suspicious phrases scanned for in retrieved document text
pub const DEFAULT_SUSPICIOUS_KEYWORDS: [&str; 6] = [
    "external_urgent_implant",
    "not covered",
    "invalid license",
    "billed hours: 999",
    "duplicate charge",
    "999",
];

/// Compiled fallback values used when neither CLI, ENV nor TOML provide one
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub bind: String,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was compiled for
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("claimguard"))
            .unwrap_or_else(|| PathBuf::from("./claimguard_data"));

        Self {
            root_folder,
            log_level: "info".to_string(),
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[server]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
}

/// `[retrieval]` section; unset keys fall back to [`RetrievalSettings::default`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub concurrency: Option<usize>,
    pub top_k: Option<usize>,
}

/// `[scoring]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub suspicious_keywords: Option<Vec<String>>,
}

/// `[llm]` section (used by the interactive agent)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
}

/// On-disk TOML configuration
///
/// All sections are optional; a missing file yields `TomlConfig::default()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl TomlConfig {
    /// Load a TOML config file. Missing file is not an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No TOML config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load a TOML config file, degrading to defaults on any error
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{} - continuing with compiled defaults", e);
                Self::default()
            }
        }
    }
}

/// Default TOML config path for a module: `<config_dir>/claimguard/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("claimguard").join(format!("{}.toml", module_name)))
}

/// Root folder resolution
///
/// Priority order:
/// 1. Command-line argument
/// 2. `CLAIMGUARD_ROOT_FOLDER`, then `CLAIMGUARD_ROOT`, then `FRAUD_BASE_DIR`
/// 3. `root_folder` in the module TOML config
/// 4. OS-dependent compiled default
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            config_path: default_config_path(module_name),
        }
    }

    /// Use an explicit command-line value (highest priority)
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    /// Override the TOML config location
    pub fn with_config_path(mut self, config_path: PathBuf) -> Self {
        self.config_path = Some(config_path);
        self
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, "Root folder from command line: {}", path.display());
            return path.clone();
        }

        for var in [ROOT_FOLDER_ENV, ROOT_ENV, LEGACY_BASE_DIR_ENV] {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    info!(module = %self.module_name, "Root folder from {}: {}", var, value);
                    return PathBuf::from(value);
                }
            }
        }

        if let Some(config_path) = &self.config_path {
            if let Some(root) = TomlConfig::load_or_default(config_path).root_folder {
                info!(module = %self.module_name, "Root folder from TOML config: {}", root);
                return PathBuf::from(root);
            }
        }

        let default = CompiledDefaults::for_current_platform().root_folder;
        info!(module = %self.module_name, "Root folder from compiled default: {}", default.display());
        default
    }
}

/// Every persisted location the pipeline reads or writes
#[derive(Debug, Clone)]
pub struct PipelinePaths {
    pub root_folder: PathBuf,
    /// SQLite claim store, Stage-1 snapshot and review queue table
    pub database: PathBuf,
    /// Raw supporting documents plus `metadata.json`
    pub docs_raw_dir: PathBuf,
    pub models_dir: PathBuf,
    pub processed_dir: PathBuf,
}

impl PipelinePaths {
    pub fn new(root_folder: impl Into<PathBuf>) -> Self {
        let root_folder = root_folder.into();
        Self {
            database: root_folder.join("claimguard.db"),
            docs_raw_dir: root_folder.join("data").join("raw").join("docs"),
            models_dir: root_folder.join("models"),
            processed_dir: root_folder.join("data").join("processed"),
            root_folder,
        }
    }

    /// Document metadata written by the generator: `[{file, claim_id, provider_id}]`
    pub fn docs_metadata(&self) -> PathBuf {
        self.docs_raw_dir.join("metadata.json")
    }

    /// Prepared chunk list
    pub fn chunks_json(&self) -> PathBuf {
        self.models_dir.join("docs_metadata.json")
    }

    /// Persisted embedding vectors, one per chunk
    pub fn embeddings_json(&self) -> PathBuf {
        self.models_dir.join("embeddings.json")
    }

    /// JSON form of the review queue
    pub fn review_queue_json(&self) -> PathBuf {
        self.processed_dir.join("review_queue.json")
    }

    /// Create all directories (idempotent)
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.root_folder,
            &self.docs_raw_dir,
            &self.models_dir,
            &self.processed_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Retrieval collaborator tunables
#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    /// Bound on a single retrieval attempt
    pub timeout: Duration,
    /// Additional attempts after the first failure
    pub max_retries: u32,
    pub initial_backoff: Duration,
    /// Concurrent Stage-2 analyses during a batch
    pub concurrency: usize,
    /// Default fan-out
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 2,
            initial_backoff: Duration::from_millis(50),
            concurrency: 4,
            top_k: 5,
        }
    }
}

impl RetrievalSettings {
    pub fn from_toml(config: &RetrievalConfig) -> Self {
        let defaults = Self::default();
        Self {
            timeout: config
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
            max_retries: config.max_retries.unwrap_or(defaults.max_retries),
            initial_backoff: config
                .initial_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_backoff),
            concurrency: config.concurrency.unwrap_or(defaults.concurrency).max(1),
            top_k: config.top_k.unwrap_or(defaults.top_k).max(1),
        }
    }
}

/// Stage-2 scoring inputs that are configuration rather than code
#[derive(Debug, Clone)]
pub struct ScoringSettings {
    pub suspicious_keywords: Vec<String>,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            suspicious_keywords: DEFAULT_SUSPICIOUS_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

/// Explicit configuration handed to every pipeline component
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub paths: PipelinePaths,
    pub retrieval: RetrievalSettings,
    pub scoring: ScoringSettings,
}

impl PipelineConfig {
    /// Defaults rooted at `root_folder`
    pub fn new(root_folder: impl Into<PathBuf>) -> Self {
        Self {
            paths: PipelinePaths::new(root_folder),
            retrieval: RetrievalSettings::default(),
            scoring: ScoringSettings::default(),
        }
    }

    /// Combine the resolved root folder with TOML overrides
    pub fn from_toml(root_folder: impl Into<PathBuf>, toml: &TomlConfig) -> Self {
        let scoring = match &toml.scoring.suspicious_keywords {
            Some(keywords) if !keywords.is_empty() => ScoringSettings {
                suspicious_keywords: keywords.clone(),
            },
            Some(_) => {
                warn!("Empty [scoring] suspicious_keywords ignored, using defaults");
                ScoringSettings::default()
            }
            None => ScoringSettings::default(),
        };

        Self {
            paths: PipelinePaths::new(root_folder),
            retrieval: RetrievalSettings::from_toml(&toml.retrieval),
            scoring,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_layout() {
        let paths = PipelinePaths::new("/tmp/cg");
        assert_eq!(paths.database, PathBuf::from("/tmp/cg/claimguard.db"));
        assert_eq!(paths.chunks_json(), PathBuf::from("/tmp/cg/models/docs_metadata.json"));
        assert_eq!(
            paths.review_queue_json(),
            PathBuf::from("/tmp/cg/data/processed/review_queue.json")
        );
        assert_eq!(
            paths.docs_metadata(),
            PathBuf::from("/tmp/cg/data/raw/docs/metadata.json")
        );
    }

    #[test]
    fn test_retrieval_settings_from_partial_toml() {
        let config = RetrievalConfig {
            timeout_ms: Some(250),
            concurrency: Some(0),
            ..Default::default()
        };
        let settings = RetrievalSettings::from_toml(&config);
        assert_eq!(settings.timeout, Duration::from_millis(250));
        assert_eq!(settings.max_retries, 2);
        // Zero workers would stall a batch
        assert_eq!(settings.concurrency, 1);
    }

    #[test]
    fn test_default_keywords() {
        let scoring = ScoringSettings::default();
        assert_eq!(scoring.suspicious_keywords.len(), 6);
        assert!(scoring.suspicious_keywords.contains(&"invalid license".to_string()));
    }

    #[test]
    fn test_empty_keyword_override_ignored() {
        let toml = TomlConfig {
            scoring: ScoringConfig {
                suspicious_keywords: Some(vec![]),
            },
            ..Default::default()
        };
        let config = PipelineConfig::from_toml("/tmp/cg", &toml);
        assert_eq!(config.scoring.suspicious_keywords.len(), 6);
    }
}
