use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::User;

/// Settings the persistent [DefinitionManager](crate::manager::DefinitionManager)
/// is built from. Usually stored as a YAML file next to the host configuration:
///
/// ```yaml
/// definitions_dir: /etc/telemetry/definitions
/// load_builtin: true
/// system_owner: system@telemetry
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Directory with `.telemetry` definition files to load on start.
    #[serde(default)]
    pub definitions_dir: Option<PathBuf>,

    /// Whether to register the definitions bundled with the engine.
    #[serde(default = "default_load_builtin")]
    pub load_builtin: bool,

    /// Owner of the bundled definitions and of those loaded from the
    /// definitions directory. They are shared globally.
    #[serde(default = "default_system_owner")]
    pub system_owner: User,
}

fn default_load_builtin() -> bool {
    true
}

fn default_system_owner() -> User {
    User::new(EngineConfig::DEFAULT_SYSTEM_OWNER)
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Failed to read the configuration file. {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed configuration. {0}")]
    Yaml(#[from] serde_yml::Error),
}

impl EngineConfig {
    pub const DEFAULT_SYSTEM_OWNER: &'static str = "system@telemetry";

    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigLoadError> {
        Ok(serde_yml::from_str(source)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&source)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            definitions_dir: None,
            load_builtin: default_load_builtin(),
            system_owner: default_system_owner(),
        }
    }
}
