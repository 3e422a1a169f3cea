//! Configuration loading for the melodic hypothesis tools.
//!
//! # Usage
//!
//! ```rust,no_run
//! use hypoconf::HypoConfig;
//!
//! let config = HypoConfig::load().expect("Failed to load config");
//!
//! if let Some(corpus) = &config.inputs.corpus {
//!     println!("corpus: {}", corpus.display());
//! }
//! println!("output format: {}", config.output.format);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins, table by table):
//! 1. `/etc/melodic-hypotheses/config.toml` (system)
//! 2. `~/.config/melodic-hypotheses/config.toml` (user)
//! 3. `./hypotheses.toml` (local override, or the `--config` path)
//! 4. Environment variables (`HYPOTHESES_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [inputs]
//! corpus = "~/mtc/corpus.json"
//! occurrences = "~/mtc/occurrences.csv"
//! information_content = "~/mtc/idyom/notes.dat"
//! entropy = "~/mtc/fantastic/entropy.csv"
//!
//! [output]
//! path = "hypotheses.csv"
//! format = "csv"
//! missing_value = "NA"
//!
//! [formats]
//! information_content_delimiter = "space"
//! mcsv_ticks = 3072
//!
//! [expectancy]
//! return_weight = 1.5
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{
    parse_delimiter, ExpectancyConfig, FormatsConfig, InputsConfig, OutputConfig, TelemetryConfig,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HypoConfig {
    #[serde(default)]
    pub inputs: InputsConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub formats: FormatsConfig,

    #[serde(default)]
    pub expectancy: ExpectancyConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl HypoConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./hypotheses.toml` override and must exist. System and user configs
    /// still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::load_table(&path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let origin = sources
            .files
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("<defaults>"));
        let mut config = loader::from_table(merged, &origin)?;

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let body = toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            key: "<config>".to_string(),
            message: e.to_string(),
        })?;
        Ok(format!("# Melodic hypotheses configuration\n\n{}", body))
    }

    pub fn output_delimiter(&self) -> Result<u8, ConfigError> {
        parse_delimiter("output.delimiter", &self.output.delimiter)
    }

    pub fn occurrences_delimiter(&self) -> Result<u8, ConfigError> {
        parse_delimiter("formats.occurrences_delimiter", &self.formats.occurrences_delimiter)
    }

    pub fn entropy_delimiter(&self) -> Result<u8, ConfigError> {
        parse_delimiter("formats.entropy_delimiter", &self.formats.entropy_delimiter)
    }

    pub fn information_content_delimiter(&self) -> Result<u8, ConfigError> {
        parse_delimiter(
            "formats.information_content_delimiter",
            &self.formats.information_content_delimiter,
        )
    }
}
