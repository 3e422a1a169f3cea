//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, HypoConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Directory name under `/etc` and the user config dir.
pub const APP_DIR: &str = "melodic-hypotheses";

/// Local override file in the current directory.
pub const LOCAL_FILE: &str = "hypotheses.toml";

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided it replaces the local override and is always
/// returned, so a missing file fails at load time instead of being skipped.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc").join(APP_DIR).join("config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join(APP_DIR).join("config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // CLI override takes precedence over local
    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from(LOCAL_FILE);
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a config file as a raw TOML table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_table(&contents, path)
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Merge `overlay` into `base`. Nested tables merge key by key; any other
/// value in `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Turn a merged table into a config, filling unset fields with defaults.
pub fn from_table(table: toml::Table, origin: &Path) -> Result<HypoConfig, ConfigError> {
    let mut config: HypoConfig =
        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;

    for path in [
        &mut config.inputs.corpus,
        &mut config.inputs.occurrences,
        &mut config.inputs.information_content,
        &mut config.inputs.entropy,
        &mut config.output.path,
    ]
    .into_iter()
    .flatten()
    {
        let expanded = expand_path(&path.to_string_lossy());
        *path = expanded;
    }

    Ok(config)
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut HypoConfig, sources: &mut ConfigSources) {
    let path_vars: [(&str, &mut Option<PathBuf>); 5] = [
        ("HYPOTHESES_CORPUS", &mut config.inputs.corpus),
        ("HYPOTHESES_OCCURRENCES", &mut config.inputs.occurrences),
        (
            "HYPOTHESES_INFORMATION_CONTENT",
            &mut config.inputs.information_content,
        ),
        ("HYPOTHESES_ENTROPY", &mut config.inputs.entropy),
        ("HYPOTHESES_OUTPUT", &mut config.output.path),
    ];
    for (var, slot) in path_vars {
        if let Ok(v) = env::var(var) {
            *slot = Some(expand_path(&v));
            sources.env_overrides.push(var.to_string());
        }
    }

    if let Ok(v) = env::var("HYPOTHESES_OUTPUT_FORMAT") {
        config.output.format = v;
        sources.env_overrides.push("HYPOTHESES_OUTPUT_FORMAT".to_string());
    }
    if let Ok(v) = env::var("HYPOTHESES_MCSV_TICKS") {
        if let Ok(ticks) = v.parse() {
            config.formats.mcsv_ticks = ticks;
            sources.env_overrides.push("HYPOTHESES_MCSV_TICKS".to_string());
        }
    }

    if let Ok(v) = env::var("HYPOTHESES_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("HYPOTHESES_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Ok(v) = env::var("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}
