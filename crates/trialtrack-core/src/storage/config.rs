//! TOML-based application configuration.
//!
//! Stores CLI-facing preferences at `~/.config/trialtrack/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/trialtrack/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cycle length used when a group is created without an explicit one.
    #[serde(default = "default_cycle_length")]
    pub default_cycle_length: u32,
    /// Clear a group's progress record automatically once the final
    /// position's round is recorded.
    #[serde(default = "default_true")]
    pub auto_clear_completed: bool,
    /// Emit command output as JSON by default.
    #[serde(default)]
    pub json_output: bool,
}

fn default_cycle_length() -> u32 {
    7
}
fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_cycle_length: default_cycle_length(),
            auto_clear_completed: true,
            json_output: false,
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, std::io::Error> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load the configuration, falling back to defaults when the file does
    /// not exist yet.
    pub fn load() -> Result<Self, crate::error::CoreError> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        toml::from_str(&raw).map_err(|err| crate::error::CoreError::Custom(err.to_string()))
    }

    pub fn save(&self) -> Result<(), crate::error::CoreError> {
        let raw = toml::to_string_pretty(self)
            .map_err(|err| crate::error::CoreError::Custom(err.to_string()))?;
        std::fs::write(Self::path()?, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_survive_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.default_cycle_length, 7);
        assert!(config.auto_clear_completed);
        assert!(!config.json_output);
    }

    #[test]
    fn test_partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str("default_cycle_length = 3").unwrap();
        assert_eq!(config.default_cycle_length, 3);
        assert!(config.auto_clear_completed);
    }
}
