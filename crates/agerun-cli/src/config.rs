//! Optional TOML configuration for the `agerun` binary.
//!
//! Grounded on `compiler/src/lint.rs::LintConfig`'s `toml::from_str` +
//! `#[derive(Deserialize)]` shape: a small struct with `#[serde(default)]`
//! fields so an absent config file, or one missing a key, falls back to
//! hard-coded defaults.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_methodology_file")]
    pub methodology_file: String,
    #[serde(default = "default_agency_file")]
    pub agency_file: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            methodology_file: default_methodology_file(),
            agency_file: default_agency_file(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("failed to parse config: {e}"))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config file {}: {e}", path.display()))?;
        Self::from_toml(&text)
    }
}

fn default_methodology_file() -> String {
    agerun_runtime::persistence::METHODOLOGY_FILE_NAME.to_string()
}

fn default_agency_file() -> String {
    agerun_runtime::persistence::AGENCY_FILE_NAME.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_fall_back_to_defaults() {
        let config = RuntimeConfig::from_toml("").unwrap();
        assert_eq!(config.methodology_file, "methodology.agerun");
        assert_eq!(config.agency_file, "agency.agerun");
    }

    #[test]
    fn overrides_one_field_without_disturbing_the_other() {
        let config = RuntimeConfig::from_toml(r#"methodology_file = "custom.agerun""#).unwrap();
        assert_eq!(config.methodology_file, "custom.agerun");
        assert_eq!(config.agency_file, "agency.agerun");
    }
}
