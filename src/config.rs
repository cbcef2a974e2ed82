use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audio::{CaptureConfig, MonitorConfig};
use crate::channel::ReconnectPolicy;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub reconnect: ReconnectPolicy,
    pub audio: CaptureConfig,
    pub monitor: MonitorConfig,
    pub backend: BackendConfig,
}

/// Where the client finds the backend
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub socket_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            socket_path: "/ws/socket.io".to_string(),
        }
    }
}

/// Practice backend bind address (`serve` command)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Config {
    /// Layer the optional file at `path` (any extension `config` understands)
    /// and `PRACTICE__SECTION__KEY` environment variables over the defaults.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("PRACTICE").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        let cfg: Self = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.monitor.interval_ms > 0, "monitor.interval_ms must be positive");
        anyhow::ensure!(
            self.monitor.visibility_scale.is_finite() && self.monitor.visibility_scale > 0.0,
            "monitor.visibility_scale must be a positive number"
        );
        anyhow::ensure!(self.monitor.fft_size >= 32, "monitor.fft_size must be at least 32");
        anyhow::ensure!(
            self.monitor.max_decibels > self.monitor.min_decibels,
            "monitor.max_decibels must exceed monitor.min_decibels"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend_contract() {
        let cfg = Config::default();
        assert_eq!(cfg.server.socket_path, "/ws/socket.io");
        assert_eq!(cfg.reconnect.delay_ms, 1000);
        assert_eq!(cfg.reconnect.max_attempts, 5);
        assert_eq!(cfg.audio.sample_rate, 16000);
        assert_eq!(cfg.audio.channels, 1);
        assert!(cfg.audio.echo_cancellation);
        assert!(cfg.audio.noise_suppression);
        assert_eq!(cfg.monitor.interval_ms, 100);
        assert_eq!(cfg.monitor.visibility_scale, 2.0);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = Config::load("does/not/exist/speaking-practice").unwrap();
        assert_eq!(cfg.backend.port, 5000);
    }
}
