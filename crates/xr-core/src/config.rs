//! Configuration system for the xenon-rt runtime

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::RuntimeError;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub memory: MemoryConfig,
    pub hle: HleConfig,
    pub crt: CrtConfig,
    pub debug: DebugConfig,
}

/// Guest address space settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Size of the reserved guest address space in bytes
    pub guest_size: u64,
    /// Base of the guest stack region
    pub stack_base: u32,
    /// Size of the guest stack region
    pub stack_size: u32,
}

/// Host routine registration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HleConfig {
    /// First guest address handed out to registered stubs
    pub stub_base: u32,
}

/// Guest C runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrtConfig {
    /// Upper bound on characters read for a `%s` argument without precision
    pub max_string_length: u32,
    /// Log every formatted-output call with its rendered result
    pub trace_calls: bool,
}

/// Debug settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
}

/// Logging level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`
    pub fn as_directive(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

// Default implementations

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            guest_size: 0x1_0000_0000,
            stack_base: 0x7000_0000,
            stack_size: 0x0010_0000,
        }
    }
}

impl Default for HleConfig {
    fn default() -> Self {
        Self {
            stub_base: 0x2F00_0000,
        }
    }
}

impl Default for CrtConfig {
    fn default() -> Self {
        Self {
            max_string_length: 16384,
            trace_calls: false,
        }
    }
}

impl Config {
    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> Result<Self, RuntimeError> {
        let path = Self::config_path();

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Self::from_toml_str(&content)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, RuntimeError> {
        toml::from_str(content).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), RuntimeError> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| RuntimeError::Config(e.to_string()))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("xenon-rt")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.memory.guest_size, 0x1_0000_0000);
        assert_eq!(config.hle.stub_base, 0x2F00_0000);
        assert_eq!(config.crt.max_string_length, 16384);
        assert_eq!(config.debug.log_level, LogLevel::Info);
        assert!(!config.crt.trace_calls);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = Config::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed.memory.stack_base, config.memory.stack_base);
        assert_eq!(parsed.crt.max_string_length, config.crt.max_string_length);
    }

    #[test]
    fn test_partial_config() {
        let parsed = Config::from_toml_str(
            "[crt]\nmax_string_length = 256\ntrace_calls = true\n\n[debug]\nlog_level = \"Trace\"\n",
        )
        .unwrap();
        assert_eq!(parsed.crt.max_string_length, 256);
        assert!(parsed.crt.trace_calls);
        assert_eq!(parsed.debug.log_level, LogLevel::Trace);
        assert_eq!(parsed.hle.stub_base, 0x2F00_0000);
    }

    #[test]
    fn test_invalid_config() {
        let err = Config::from_toml_str("[crt]\nmax_string_length = \"lots\"\n").unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }
}
