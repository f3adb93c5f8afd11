//! TOML-based configuration for trellis.
//!
//! Supports a config file (trellis.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [compile]
//! max_concurrent_lookups = 8
//!
//! [dashboard]
//! grid_width = 24
//!
//! [metadata]
//! snapshot = "${TRELLIS_METADATA}"
//!
//! [logging]
//! filter = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TRELLIS_CONFIG";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub compile: CompileSettings,
    pub dashboard: DashboardSettings,
    pub metadata: MetadataSettings,
    pub logging: LoggingSettings,
}

/// Compilation pipeline settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompileSettings {
    /// Upper bound on in-flight metadata lookups per stage.
    pub max_concurrent_lookups: usize,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            max_concurrent_lookups: 8,
        }
    }
}

/// Dashboard layout settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardSettings {
    /// Number of grid columns; a dashcard's `col + size_x` may not exceed it.
    pub grid_width: i64,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self { grid_width: 24 }
    }
}

/// Metadata source used by the CLI.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MetadataSettings {
    /// Path to a JSON metadata snapshot (supports ${ENV_VAR} expansion).
    pub snapshot: Option<String>,
}

impl MetadataSettings {
    /// Snapshot path with environment variables expanded.
    pub fn snapshot_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.snapshot
            .as_deref()
            .map(|raw| expand_env_vars(raw).map(PathBuf::from))
            .transpose()
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `TRELLIS_CONFIG`
    /// 2. `./trellis.toml`
    /// 3. `~/.config/trellis/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var(CONFIG_ENV) {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("trellis.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("trellis").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.compile.max_concurrent_lookups == 0 {
            return Err(SettingsError::InvalidConfig(
                "compile.max_concurrent_lookups must be at least 1".to_string(),
            ));
        }
        if self.dashboard.grid_width < 1 {
            return Err(SettingsError::InvalidConfig(
                "dashboard.grid_width must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax. A lone `$` is kept.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            let name: String = chars.by_ref().take_while(|&ch| ch != '}').collect();
            name
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                result.push('$');
                continue;
            }
            name
        };

        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name))?;
        result.push_str(&value);
    }

    Ok(result)
}
