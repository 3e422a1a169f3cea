//! Configuration sections.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ConfigError;

/// Input files. Any of these may also be given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputsConfig {
    /// Melody corpus, JSON array of `{filename, symbols}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corpus: Option<PathBuf>,

    /// Occurrence table, delimited text or `.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrences: Option<PathBuf>,

    /// Note-level information content written by IDyOM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub information_content: Option<PathBuf>,

    /// Phrase-level n-gram entropy written by FANTASTIC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entropy: Option<PathBuf>,
}

/// Where and how the hypothesis table is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output file. Default: stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// `csv` or `json`.
    /// Default: csv
    #[serde(default = "OutputConfig::default_format")]
    pub format: String,

    /// Default: ","
    #[serde(default = "OutputConfig::default_delimiter")]
    pub delimiter: String,

    /// Written in place of missing values in delimited output.
    /// Default: NA
    #[serde(default = "OutputConfig::default_missing_value")]
    pub missing_value: String,
}

impl OutputConfig {
    fn default_format() -> String {
        "csv".to_string()
    }

    fn default_delimiter() -> String {
        ",".to_string()
    }

    fn default_missing_value() -> String {
        "NA".to_string()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            format: Self::default_format(),
            delimiter: Self::default_delimiter(),
            missing_value: Self::default_missing_value(),
        }
    }
}

/// Layout of the files read and written alongside the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatsConfig {
    /// Default: ","
    #[serde(default = "FormatsConfig::default_comma")]
    pub occurrences_delimiter: String,

    /// Default: ","
    #[serde(default = "FormatsConfig::default_comma")]
    pub entropy_delimiter: String,

    /// IDyOM writes space-separated `.dat` files.
    /// Default: " "
    #[serde(default = "FormatsConfig::default_space")]
    pub information_content_delimiter: String,

    /// Ticks per beat for MCSV export.
    /// Default: 3072
    #[serde(default = "FormatsConfig::default_mcsv_ticks")]
    pub mcsv_ticks: u32,
}

impl FormatsConfig {
    fn default_comma() -> String {
        ",".to_string()
    }

    fn default_space() -> String {
        " ".to_string()
    }

    fn default_mcsv_ticks() -> u32 {
        3072
    }
}

impl Default for FormatsConfig {
    fn default() -> Self {
        Self {
            occurrences_delimiter: Self::default_comma(),
            entropy_delimiter: Self::default_comma(),
            information_content_delimiter: Self::default_space(),
            mcsv_ticks: Self::default_mcsv_ticks(),
        }
    }
}

/// Two-factor expectancy model parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectancyConfig {
    /// Default: 11
    #[serde(default = "ExpectancyConfig::default_max_implicative")]
    pub max_implicative: u32,

    /// Default: 12
    #[serde(default = "ExpectancyConfig::default_max_realized")]
    pub max_realized: u32,

    /// Default: 6
    #[serde(default = "ExpectancyConfig::default_tritone")]
    pub tritone: u32,

    /// Default: 2
    #[serde(default = "ExpectancyConfig::default_return_tolerance")]
    pub return_tolerance: u32,

    /// Default: 1.5
    #[serde(default = "ExpectancyConfig::default_return_weight")]
    pub return_weight: f64,
}

impl ExpectancyConfig {
    fn default_max_implicative() -> u32 {
        11
    }

    fn default_max_realized() -> u32 {
        12
    }

    fn default_tritone() -> u32 {
        6
    }

    fn default_return_tolerance() -> u32 {
        2
    }

    fn default_return_weight() -> f64 {
        1.5
    }
}

impl Default for ExpectancyConfig {
    fn default() -> Self {
        Self {
            max_implicative: Self::default_max_implicative(),
            max_realized: Self::default_max_realized(),
            tritone: Self::default_tritone(),
            return_tolerance: Self::default_return_tolerance(),
            return_weight: Self::default_return_weight(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter (trace, debug, info, warn, error, or a full directive).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

/// Parse a one-byte delimiter. Accepts the character itself or the names
/// `tab`, `space`, `comma`, `semicolon`.
pub fn parse_delimiter(key: &str, value: &str) -> Result<u8, ConfigError> {
    let byte = match value {
        "tab" | "\\t" => b'\t',
        "space" => b' ',
        "comma" => b',',
        "semicolon" => b';',
        other if other.len() == 1 => other.as_bytes()[0],
        other => {
            return Err(ConfigError::Invalid {
                key: key.to_string(),
                message: format!("{:?} is not a single-byte delimiter", other),
            })
        }
    };
    Ok(byte)
}
