//! Configuration management with layered hierarchy

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::Project;
use crate::import::DEFAULT_CHUNK_SIZE;

/// Configuration keys with their descriptions
pub const KEYS: &[(&str, &str)] = &[
    ("cca", "Work-site code stamped on every imported row"),
    ("chunk_size", "Rows per bulk insert during commit (default 50)"),
    (
        "allow_warnings",
        "Import rows that only carry warnings (default true)",
    ),
    ("default_sheet", "Worksheet read from workbooks (default: first)"),
];

/// Cadastro configuration with layered hierarchy
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Work-site code (CCA)
    pub cca: Option<String>,

    /// Rows per bulk insert
    pub chunk_size: Option<usize>,

    /// Whether warning rows are importable
    pub allow_warnings: Option<bool>,

    /// Worksheet name to read from workbooks
    pub default_sheet: Option<String>,
}

impl Config {
    /// Load configuration from all sources, discovering the project from the
    /// current directory
    pub fn load() -> Self {
        let project = Project::discover().ok();
        Self::load_for(project.as_ref())
    }

    /// Load configuration for a known project
    pub fn load_for(project: Option<&Project>) -> Self {
        let global = Self::global_config_path();
        let local = project.map(Project::config_path);
        let mut config = Self::load_files(global.as_deref(), local.as_deref());
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Merge the global file then the project file over the defaults
    pub fn load_files(global: Option<&Path>, project: Option<&Path>) -> Self {
        let mut config = Config::default();
        for path in [global, project].into_iter().flatten() {
            if let Some(layer) = Self::read_file(path) {
                config.merge(layer);
            }
        }
        config
    }

    fn read_file(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| warn!(path = %path.display(), error = %e, "config file unreadable"))
            .ok()?;
        match serde_yml::from_str::<Option<Config>>(&contents) {
            Ok(config) => Some(config.unwrap_or_default()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config file ignored");
                None
            }
        }
    }

    /// Overlay `CADASTRO_CCA` and `CADASTRO_CHUNK_SIZE`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(cca) = var("CADASTRO_CCA").filter(|v| !v.trim().is_empty()) {
            self.cca = Some(cca.trim().to_string());
        }
        if let Some(size) = var("CADASTRO_CHUNK_SIZE") {
            match size.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.chunk_size = Some(n),
                _ => warn!(value = %size, "ignoring invalid CADASTRO_CHUNK_SIZE"),
            }
        }
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "cadastro")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.cca.is_some() {
            self.cca = other.cca;
        }
        if other.chunk_size.is_some() {
            self.chunk_size = other.chunk_size;
        }
        if other.allow_warnings.is_some() {
            self.allow_warnings = other.allow_warnings;
        }
        if other.default_sheet.is_some() {
            self.default_sheet = other.default_sheet;
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size.filter(|n| *n > 0).unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    pub fn allow_warnings(&self) -> bool {
        self.allow_warnings.unwrap_or(true)
    }

    /// Current value of a key as display text
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "cca" => self.cca.clone(),
            "chunk_size" => self.chunk_size.map(|n| n.to_string()),
            "allow_warnings" => self.allow_warnings.map(|b| b.to_string()),
            "default_sheet" => self.default_sheet.clone(),
            _ => None,
        }
    }

    /// Convert a command-line value to the YAML type its key expects
    pub fn parse_value(key: &str, value: &str) -> Result<serde_yml::Value, ConfigError> {
        let invalid = |expected: &'static str| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected,
        };
        match key {
            "cca" | "default_sheet" => Ok(serde_yml::Value::String(value.trim().to_string())),
            "chunk_size" => match value.trim().parse::<u64>() {
                Ok(n) if n > 0 => Ok(serde_yml::Value::Number(n.into())),
                _ => Err(invalid("a positive integer")),
            },
            "allow_warnings" => match value.trim().to_lowercase().as_str() {
                "true" | "sim" | "yes" | "1" => Ok(serde_yml::Value::Bool(true)),
                "false" | "não" | "nao" | "no" | "0" => Ok(serde_yml::Value::Bool(false)),
                _ => Err(invalid("true or false")),
            },
            _ => Err(ConfigError::UnknownKey(key.to_string())),
        }
    }
}

/// Errors editing configuration
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key '{0}'")]
    #[diagnostic(
        code(cadastro::config::unknown_key),
        help("run `cadastro config keys` to list the valid keys")
    )]
    UnknownKey(String),

    #[error("invalid value '{value}' for '{key}': expected {expected}")]
    #[diagnostic(code(cadastro::config::invalid_value))]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}
