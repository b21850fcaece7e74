use std::path::{Path, PathBuf};

use expo_core::{EnumEncoding, TypeGate};
use expo_schema::Validatable;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::Level;

/// Inspector configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "Inspector Configuration")]
pub struct InspectConfig {
    /// Path to the type manifest
    #[schemars(description = "Type manifest JSON file, relative paths resolve against the config file")]
    pub manifest: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[schemars(description = "Log level: trace, debug, info, warn, error")]
    #[schemars(regex(pattern = r"^(trace|debug|info|warn|error)$"))]
    pub log_level: String,

    /// Value-type check applied before markers
    #[serde(default)]
    #[schemars(description = "container_aware checks the (element) value type, disabled skips the check")]
    pub type_gate: TypeGate,

    /// Enum member encoding in documents
    #[serde(default)]
    #[schemars(description = "name writes variant names, underlying writes the integral value")]
    pub enum_encoding: EnumEncoding,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl InspectConfig {
    /// Configured log level, INFO when unrecognised
    pub fn level(&self) -> Level {
        expo_log::parse_level(&self.log_level).unwrap_or(Level::INFO)
    }

    /// Manifest location, resolved against the directory holding `config_path`
    pub fn manifest_path(&self, config_path: &str) -> PathBuf {
        let manifest = Path::new(&self.manifest);
        if manifest.is_absolute() {
            return manifest.to_path_buf();
        }
        Path::new(config_path)
            .parent()
            .map(|dir| dir.join(manifest))
            .unwrap_or_else(|| manifest.to_path_buf())
    }
}

impl Validatable for InspectConfig {}
