use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use trellis_batch::{AckMode, Encoding};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

/// Settings read from `--config`. Missing keys take their defaults and
/// command-line flags override whatever the file says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `tracing` filter used when neither TRELLIS_LOG nor RUST_LOG is set
    pub log_level: String,
    pub encoding: Encoding,
    pub ack_mode: AckMode,
    pub output: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            encoding: Encoding::default(),
            ack_mode: AckMode::default(),
            output: OutputFormat::default(),
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_take_defaults() {
        let config: Config = serde_json::from_str(r#"{ "encoding": "shared-memory" }"#).unwrap();
        assert_eq!(config.encoding, Encoding::SharedMemory);
        assert_eq!(config.ack_mode, AckMode::Immediate);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.output, OutputFormat::Pretty);
    }

    #[test]
    fn test_no_path_means_defaults() {
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }

    #[test]
    fn test_unknown_values_rejected() {
        assert!(serde_json::from_str::<Config>(r#"{ "output": "xml" }"#).is_err());
    }
}
