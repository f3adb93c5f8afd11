//! Configuration module for trellis.
//!
//! Handles the settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, CompileSettings, DashboardSettings, LoggingSettings, MetadataSettings,
    Settings, SettingsError, CONFIG_ENV,
};
