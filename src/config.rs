//! Ascent configuration via TOML files.
//!
//! This module provides configuration parsing from TOML format with sensible
//! defaults matching the reference ascent schedule.

use std::fs;
use std::path::Path;

use serde::Serialize;
use toml::Value;

/// Gradient-ascent configuration loaded from a TOML file.
///
/// # Examples
///
/// ```
/// use filter_visualizer::AscentConfig;
///
/// let config = AscentConfig::load_from_file("visualizer.toml")
///     .unwrap_or_else(|_| AscentConfig::default());
///
/// println!("{} steps at step size {}", config.iterations, config.step_size);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct AscentConfig {
    /// Number of ascent steps per filter
    pub iterations: usize,
    /// Per-iteration pixel displacement
    pub step_size: f32,
    /// Seed for noise initialization
    pub seed: u64,
}

impl AscentConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(&path)?;
        Self::from_str(&contents)
    }

    pub fn from_str(toml_str: &str) -> Result<Self, ConfigError> {
        let value: Value =
            toml::from_str(toml_str).map_err(|err| ConfigError::Parse(err.to_string()))?;
        let table = value
            .get("ascent")
            .and_then(|v| v.as_table())
            .cloned()
            .unwrap_or_default();

        let iterations = table
            .get("iterations")
            .and_then(|v| v.as_integer())
            .map(|v| v.max(1) as usize)
            .unwrap_or(20);

        let step_size = table
            .get("step_size")
            .map(|value| {
                if let Some(float) = value.as_float() {
                    float as f32
                } else if let Some(int) = value.as_integer() {
                    int as f32
                } else {
                    1.0
                }
            })
            .unwrap_or(1.0);

        let seed = table
            .get("seed")
            .and_then(|v| v.as_integer())
            .map(|v| v.max(0) as u64)
            .unwrap_or(42);

        Ok(Self {
            iterations,
            step_size,
            seed,
        })
    }
}

impl Default for AscentConfig {
    fn default() -> Self {
        Self {
            iterations: 20,
            step_size: 1.0,
            seed: 42,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "IO error: {}", err),
            ConfigError::Parse(err) => write!(f, "Parse error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_when_section_missing() {
        let toml = "[other]\nkey = 1";
        let config = AscentConfig::from_str(toml).unwrap();
        assert_eq!(config.iterations, 20);
        assert_eq!(config.step_size, 1.0);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn config_parses_custom_values() {
        let toml = "[ascent]\niterations = 50\nstep_size = 0.5\nseed = 7";
        let config = AscentConfig::from_str(toml).unwrap();
        assert_eq!(config.iterations, 50);
        assert_eq!(config.step_size, 0.5);
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn config_accepts_integer_step_size() {
        let toml = "[ascent]\nstep_size = 2";
        let config = AscentConfig::from_str(toml).unwrap();
        assert_eq!(config.step_size, 2.0);
    }

    #[test]
    fn config_clamps_iterations_to_at_least_one() {
        let toml = "[ascent]\niterations = 0";
        let config = AscentConfig::from_str(toml).unwrap();
        assert_eq!(config.iterations, 1);
    }

    #[test]
    fn config_rejects_invalid_toml() {
        assert!(AscentConfig::from_str("not toml [").is_err());
    }
}
