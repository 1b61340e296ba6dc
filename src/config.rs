//! Launcher configuration using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. `config/experiment_runner.toml` (or the file passed with `--config`)
//! 3. Environment variables prefixed with `EXPERIMENT_RUNNER_`, `__` between
//!    nested keys
//!
//! # Example
//! ```no_run
//! use experiment_runner::config::RunnerConfig;
//!
//! let config = RunnerConfig::load()?;
//! println!("Scripts: {}", config.launcher.scripts_dir.display());
//! # Ok::<(), figment::Error>(())
//! ```
//!
//! `EXPERIMENT_RUNNER_LIMITS__MAX_TEMPERATURE_K=2.5` raises the temperature
//! ceiling for one session.

use crate::error::{RunnerError, RunnerResult};
use crate::settings::FileStore;
use crate::validation::Limits;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/experiment_runner.toml";

/// Prefix of overriding environment variables.
pub const ENV_PREFIX: &str = "EXPERIMENT_RUNNER_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub application: ApplicationConfig,
    pub launcher: LauncherConfig,
    pub conversion: ConversionConfig,
    pub limits: Limits,
    pub settings: SettingsConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Experiment Runner".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// How measurement scripts are started
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Python interpreter, looked up in `PATH`
    pub interpreter: String,
    /// Directory holding the `*.py` measurement scripts
    pub scripts_dir: PathBuf,
    /// Program and arguments placed before the interpreter, e.g. `cmd.exe /k`
    /// to keep a console window open
    pub console_wrapper: Vec<String>,
    /// Let the script write to the launcher's console
    pub inherit_console: bool,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        let (interpreter, console_wrapper) = if cfg!(windows) {
            ("python", vec!["cmd.exe".to_string(), "/k".to_string()])
        } else {
            ("python3", Vec::new())
        };
        Self {
            interpreter: interpreter.to_string(),
            scripts_dir: PathBuf::from("."),
            console_wrapper,
            inherit_console: true,
        }
    }
}

/// Voltage/current conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// `I = V / R * current_scale`; 1e9 shows currents in nA
    pub current_scale: f64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            current_scale: crate::units::NANOAMPERE_SCALE,
        }
    }
}

/// Persisted operator settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Settings file; the per-user config directory when absent
    pub path: Option<PathBuf>,
}

impl RunnerConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path and the environment. A missing file
    /// leaves the defaults in place.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    /// Load and validate
    pub fn load_validated(path: Option<&Path>) -> RunnerResult<Self> {
        let config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.validate().map_err(RunnerError::Configuration)?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.as_str()) {
            return Err(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            ));
        }

        if self.launcher.interpreter.trim().is_empty() {
            return Err("launcher.interpreter must not be empty".to_string());
        }

        let scale = self.conversion.current_scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(format!(
                "Invalid conversion.current_scale {scale}. Must be a positive number"
            ));
        }

        let limits = &self.limits;
        for (name, value) in [
            ("max_temperature_k", limits.max_temperature_k),
            ("max_field_gauss", limits.max_field_gauss),
            ("max_current_ma", limits.max_current_ma),
            ("max_gate_volts", limits.max_gate_volts),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("Invalid limits.{name} {value}. Must be non-negative"));
            }
        }
        if let Some(ghz) = limits.max_frequency_ghz {
            if !ghz.is_finite() || ghz <= 0.0 {
                return Err(format!("Invalid limits.max_frequency_ghz {ghz}"));
            }
        }
        if let Some(dbm) = limits.max_power_dbm {
            if !dbm.is_finite() {
                return Err(format!("Invalid limits.max_power_dbm {dbm}"));
            }
        }

        Ok(())
    }

    /// Settings file to use: configured, else the per-user default.
    pub fn settings_path(&self) -> Option<PathBuf> {
        self.settings.path.clone().or_else(FileStore::default_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::TemperaturePolicy;
    use figment::Jail;

    #[test]
    fn defaults_validate() {
        let config = RunnerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.conversion.current_scale, 1e9);
        assert_eq!(config.limits.max_temperature_k, 1.7);
    }

    #[test]
    fn file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "runner.toml",
                r#"
                [launcher]
                interpreter = "python3.11"
                scripts_dir = "/opt/measurements"

                [limits]
                max_temperature_k = 2.0
                temperature_policy = "block"
                max_frequency_ghz = 20.0
                "#,
            )?;
            let config = RunnerConfig::load_from("runner.toml")?;
            assert_eq!(config.launcher.interpreter, "python3.11");
            assert_eq!(config.launcher.scripts_dir, PathBuf::from("/opt/measurements"));
            assert_eq!(config.limits.max_temperature_k, 2.0);
            assert_eq!(config.limits.temperature_policy, TemperaturePolicy::Block);
            assert_eq!(config.limits.max_frequency_ghz, Some(20.0));
            assert_eq!(config.limits.max_field_gauss, 60.0);
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("runner.toml", "[application]\nlog_level = \"warn\"\n")?;
            jail.set_env("EXPERIMENT_RUNNER_APPLICATION__LOG_LEVEL", "debug");
            jail.set_env("EXPERIMENT_RUNNER_LIMITS__MAX_GATE_VOLTS", "5");
            let config = RunnerConfig::load_from("runner.toml")?;
            assert_eq!(config.application.log_level, "debug");
            assert_eq!(config.limits.max_gate_volts, 5.0);
            Ok(())
        });
    }

    #[test]
    fn missing_file_keeps_defaults() {
        Jail::expect_with(|_jail| {
            let config = RunnerConfig::load_from("absent.toml")?;
            assert_eq!(config, RunnerConfig::default());
            Ok(())
        });
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = RunnerConfig::default();
        config.application.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = RunnerConfig::default();
        config.conversion.current_scale = 0.0;
        assert!(config.validate().is_err());

        let mut config = RunnerConfig::default();
        config.limits.max_current_ma = -1.0;
        assert!(config.validate().is_err());
    }
}
