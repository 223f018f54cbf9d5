//! Server configuration, loadable from a JSON file with per-field defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::codec::BodyLimits;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {source}")]
    Parse {
        #[from]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen endpoints, one listening socket each.
    pub listen: Vec<ListenConfig>,

    /// Upper bound on the request header section, in bytes.
    pub max_header_bytes: usize,

    /// Upper bound on the decoded request body, in bytes.
    pub max_body_bytes: u64,

    /// Body size above which accumulation moves from memory to a temp file.
    pub body_memory_threshold: u64,

    /// Budget for receiving the complete header section.
    pub header_timeout_ms: u64,

    /// Budget for inactivity after the header section arrived.
    pub idle_timeout_ms: u64,

    /// Directory for body spill files. Defaults to the OS temp directory.
    pub body_spill_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: vec![ListenConfig::default()],
            max_header_bytes: 16 * 1024,
            max_body_bytes: 10 * 1024 * 1024,
            body_memory_threshold: 1024 * 1024,
            header_timeout_ms: 10_000,
            idle_timeout_ms: 60_000,
            body_spill_dir: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a JSON file. Absent fields take their
    /// defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn header_timeout(&self) -> Duration {
        Duration::from_millis(self.header_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn body_limits(&self) -> BodyLimits {
        let spill_dir = match &self.body_spill_dir {
            Some(dir) => dir.into(),
            None => std::env::temp_dir(),
        };
        BodyLimits {
            max_body_bytes: self.max_body_bytes,
            memory_threshold: self.body_memory_threshold,
            spill_dir,
        }
    }
}
