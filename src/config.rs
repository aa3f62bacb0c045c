use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Top-level configuration for meshtop.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Logging verbosity (debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Tap server connection configuration.
    #[serde(default)]
    pub tap: TapConfig,

    /// Live table configuration.
    #[serde(default)]
    pub top: TopConfig,
}

/// Tap server connection configuration.
#[derive(Debug, Deserialize)]
pub struct TapConfig {
    /// Tap server address (host:port). May instead be given on the
    /// command line.
    #[serde(default)]
    pub addr: String,

    /// Connection timeout. Default: 10s.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
}

/// Live table configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TopConfig {
    /// Repaint interval. Default: 100ms.
    #[serde(default = "default_tick_interval", with = "humantime_serde")]
    pub tick_interval: Duration,

    /// Completed-request channel capacity between ingestion and rendering.
    /// Default: 100.
    #[serde(default = "default_request_queue_capacity")]
    pub request_queue_capacity: usize,

    /// Maximum in-flight requests tracked by the correlator. Default: 4096.
    #[serde(default = "default_max_pending_requests")]
    pub max_pending_requests: usize,

    /// Maximum rows kept in the aggregate table. Default: 100.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_tick_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_request_queue_capacity() -> usize {
    100
}

fn default_max_pending_requests() -> usize {
    4096
}

fn default_max_rows() -> usize {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            tap: TapConfig::default(),
            top: TopConfig::default(),
        }
    }
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            addr: String::new(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl Default for TopConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            request_queue_capacity: default_request_queue_capacity(),
            max_pending_requests: default_max_pending_requests(),
            max_rows: default_max_rows(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate the configuration for required fields and consistency.
    pub fn validate(&self) -> Result<()> {
        if self.tap.connect_timeout.is_zero() {
            bail!("tap.connect_timeout must be positive");
        }

        if self.top.tick_interval.is_zero() {
            bail!("top.tick_interval must be positive");
        }

        if self.top.request_queue_capacity == 0 {
            bail!("top.request_queue_capacity must be positive");
        }

        if self.top.max_pending_requests == 0 {
            bail!("top.max_pending_requests must be positive");
        }

        if self.top.max_rows == 0 {
            bail!("top.max_rows must be positive");
        }

        Ok(())
    }
}
