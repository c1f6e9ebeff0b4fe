//! Controller configuration.

use std::path::Path;
use std::time::Duration;

use hyperdeck_core::{ConnectionInfo, DEFAULT_PORT, EngineConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration for `hyperdeck-ctl`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CtlConfig {
    pub network: NetworkConfig,
    pub engine: EngineSection,
    pub logging: LoggingConfig,
}

/// Where the deck lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

/// Engine timings. All values in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Interval between `transport info` polls.
    pub poll_interval_ms: u64,
    /// Delay before re-reading clips after a media change.
    pub slot_settle_ms: u64,
    /// Per-command reply deadline; 0 waits forever.
    pub command_timeout_ms: u64,
    /// Events buffered per subscriber.
    pub event_capacity: usize,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "192.168.21.64".into(),
            port: DEFAULT_PORT,
            connect_timeout_ms: 5000,
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            poll_interval_ms: engine.poll_interval.as_millis() as u64,
            slot_settle_ms: engine.slot_settle_delay.as_millis() as u64,
            command_timeout_ms: engine
                .command_timeout
                .map_or(0, |limit| limit.as_millis() as u64),
            event_capacity: engine.event_capacity,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl CtlConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::debug!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo::new(self.network.host.clone(), self.network.port)
    }

    /// Engine settings, with zero timeouts mapped to "none".
    pub fn engine_config(&self) -> EngineConfig {
        let engine = &self.engine;
        EngineConfig {
            poll_interval: Duration::from_millis(engine.poll_interval_ms.max(1)),
            slot_settle_delay: Duration::from_millis(engine.slot_settle_ms),
            command_timeout: match engine.command_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            connect_timeout: Duration::from_millis(self.network.connect_timeout_ms),
            event_capacity: engine.event_capacity.max(1),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&CtlConfig::default()).unwrap();
        assert!(text.contains("[network]"));
        assert!(text.contains("host = \"192.168.21.64\""));
        assert!(text.contains("poll_interval_ms = 1000"));
    }

    #[test]
    fn defaults_match_engine() {
        let cfg = CtlConfig::default();
        assert_eq!(cfg.engine_config(), EngineConfig::default());
        assert_eq!(cfg.connection_info().port(), 9993);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg: CtlConfig = toml::from_str(
            r#"
            [network]
            host = "10.1.1.20"

            [engine]
            command_timeout_ms = 0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.network.host, "10.1.1.20");
        assert_eq!(cfg.network.port, 9993);
        assert_eq!(cfg.engine.slot_settle_ms, 300);
        assert_eq!(cfg.engine_config().command_timeout, None);
    }

    #[test]
    fn load_missing_file_falls_back() {
        let cfg = CtlConfig::load(Path::new("/definitely/not/here.toml"));
        assert_eq!(cfg.network.host, "192.168.21.64");
    }

    #[test]
    fn write_default_then_load() {
        let path = std::env::temp_dir().join(format!("hyperdeck-ctl-{}.toml", std::process::id()));
        CtlConfig::write_default(&path).unwrap();
        let cfg = CtlConfig::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(cfg.engine.poll_interval_ms, 1000);
        assert_eq!(cfg.logging.level, "warn");
    }
}
