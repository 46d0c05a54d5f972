//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`PCARE_ROOT_FOLDER`, then `PCARE_ROOT`)
//! 3. TOML config file (`~/.config/pcare/<module>.toml`)
//! 4. OS-dependent compiled default (fallback)
//!
//! Missing or unparseable TOML files never abort startup: a warning is logged
//! and compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "pcare.db";

/// Compiled-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "linux") {
            // ~/.local/share/pcare (or /var/lib/pcare for system-wide)
            dirs::data_local_dir()
                .map(|d| d.join("pcare"))
                .unwrap_or_else(|| PathBuf::from("/var/lib/pcare"))
        } else if cfg!(target_os = "macos") {
            dirs::data_dir()
                .map(|d| d.join("pcare"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/pcare"))
        } else if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join("pcare"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\pcare"))
        } else {
            PathBuf::from("./pcare_data")
        };

        Self {
            root_folder,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Logging section of the TOML config
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// One classification provider (OpenAI-compatible vision endpoint)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Provider name used in logs and vote provenance
    pub name: String,
    /// Chat completions base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Inline API key (lowest priority)
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Web search section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub requests_per_second: Option<u32>,
}

/// Structured care extraction section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Consensus threshold overrides (unset fields keep compiled defaults)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConsensusSection {
    pub confidence_threshold: Option<f64>,
    pub variance_threshold: Option<f64>,
    pub agreement_threshold: Option<f64>,
}

/// Research overrides (unset fields keep compiled defaults)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResearchSection {
    pub min_sources: Option<usize>,
    pub min_source_confidence: Option<f64>,
    pub fetch_timeout_secs: Option<u64>,
    pub min_text_length: Option<usize>,
    pub max_results_per_query: Option<usize>,
}

/// Module TOML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub consensus: ConsensusSection,
    #[serde(default)]
    pub research: ResearchSection,
    /// "manual" (default) or "automatic"
    #[serde(default)]
    pub confirmation: Option<String>,
}

/// Path of the per-module TOML file (`~/.config/pcare/<module>.toml`)
pub fn config_file_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pcare").join(format!("{}.toml", module_name)))
}

/// Parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load the module TOML config, falling back to defaults when absent or invalid
pub fn load_toml_config(module_name: &str) -> TomlConfig {
    let Some(path) = config_file_path(module_name) else {
        warn!("Could not determine config directory, using defaults");
        return TomlConfig::default();
    };

    if !path.exists() {
        debug!(path = %path.display(), "No config file found, using defaults");
        return TomlConfig::default();
    }

    match read_toml_config(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring invalid config file");
            TomlConfig::default()
        }
    }
}

/// Resolves the root folder for a module
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
        }
    }

    /// Set the command-line override
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var("PCARE_ROOT_FOLDER") {
            return PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("PCARE_ROOT") {
            return PathBuf::from(path);
        }

        if let Some(path) = config_file_path(&self.module_name).filter(|p| p.exists()) {
            match read_toml_config(&path) {
                Ok(TomlConfig {
                    root_folder: Some(root),
                    ..
                }) => return root,
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Config file unreadable, ignoring root_folder"),
            }
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and locates the database inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder (and parents) if missing; idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}
