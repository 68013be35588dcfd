//! Configuration management for cmd-runner.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::execution::{ProcessRunner, SpawnOptions};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Runner configuration.
    pub runner: RunnerSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Runner configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSection {
    /// Working directory for commands.
    pub directory: PathBuf,
    /// Run commands directly instead of through the command interpreter.
    pub bypass_shell: bool,
    /// Child environment. `None` inherits the caller's environment.
    pub env: Option<HashMap<String, String>>,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            bypass_shell: SpawnOptions::default().bypass_shell,
            env: None,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(dir) = std::env::var("CMD_RUNNER_DIR") {
            if !dir.is_empty() {
                self.runner.directory = PathBuf::from(dir);
            }
        }

        if let Ok(bypass) = std::env::var("CMD_RUNNER_BYPASS_SHELL") {
            self.runner.bypass_shell = parse_bool(&bypass)
                .ok_or(ConfigError::InvalidValue("CMD_RUNNER_BYPASS_SHELL", bypass))?;
        }

        if let Ok(level) = std::env::var("CMD_RUNNER_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref dir) = args.dir {
            self.runner.directory = dir.clone();
        }

        if !args.env.is_empty() {
            let env = self.runner.env.get_or_insert_with(HashMap::new);
            env.extend(args.env.iter().cloned());
        }

        if args.shell {
            self.runner.bypass_shell = false;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env()?;
        config.apply_args(args);

        Ok(config)
    }

    /// Build the runner described by this configuration.
    pub fn to_runner(&self) -> ProcessRunner {
        ProcessRunner::new(
            self.runner.directory.clone(),
            self.runner.env.clone(),
            Some(SpawnOptions::default().bypass_shell(self.runner.bypass_shell)),
        )
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Unparsable environment override.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidValue(name, value) => write!(f, "invalid value for {}: '{}'", name, value),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.runner.directory, PathBuf::from("."));
        assert!(config.runner.bypass_shell);
        assert!(config.runner.env.is_none());
        assert_eq!(config.log_filter(), "info");
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "runner": {
                "directory": "/srv/app",
                "bypass_shell": false,
                "env": { "PATH": "/usr/bin" }
            },
            "logging": { "level": "debug" }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.runner.directory, PathBuf::from("/srv/app"));
        assert!(!config.runner.bypass_shell);
        assert_eq!(
            config.runner.env.as_ref().unwrap().get("PATH"),
            Some(&"/usr/bin".to_string())
        );
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_config_partial_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{ "runner": { "bypass_shell": false } }"#)
            .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.runner.directory, PathBuf::from(".")); // Default
        assert!(!config.runner.bypass_shell);
    }

    #[test]
    fn test_config_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        let args = Args {
            dir: Some(PathBuf::from("/work")),
            env: vec![("KEY".to_string(), "value".to_string())],
            shell: true,
            log_level: Some("trace".to_string()),
            ..Args::default()
        };

        config.apply_args(&args);

        assert_eq!(config.runner.directory, PathBuf::from("/work"));
        assert!(!config.runner.bypass_shell);
        assert_eq!(
            config.runner.env.as_ref().unwrap().get("KEY"),
            Some(&"value".to_string())
        );
        assert_eq!(config.log_filter(), "trace");
    }

    #[test]
    fn test_apply_args_without_env_keeps_inherit() {
        let mut config = Config::default();
        config.apply_args(&Args::default());
        assert!(config.runner.env.is_none());
        assert!(config.runner.bypass_shell);
    }

    #[test]
    fn test_to_runner() {
        let mut config = Config::default();
        config.runner.directory = PathBuf::from("/tmp");
        config.runner.bypass_shell = false;

        let runner = config.to_runner();
        assert_eq!(runner.directory(), Path::new("/tmp"));
        assert!(!runner.options().bypass_shell);
        assert!(runner.env().is_none());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"bypass_shell\""));
        assert!(json.contains("\"level\""));
    }
}
