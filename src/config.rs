//! Application-level configuration loading: listening port and broadcast tick period.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/server.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "COOP_SYNC_CONFIG_PATH";
/// Environment variable that overrides the configured port.
const PORT_ENV: &str = "PORT";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(16);
/// Shortest period the broadcast loop may be scheduled at.
const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    port: u16,
    tick_period: Duration,
}

impl AppConfig {
    /// Build a configuration directly, clamping the tick period to the minimum.
    pub fn new(port: u16, tick_period: Duration) -> Self {
        Self {
            port,
            tick_period: tick_period.max(MIN_TICK_PERIOD),
        }
    }

    /// Load the configuration from disk, then apply the `PORT` override.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        port = config.port,
                        tick_period_ms = config.tick_period.as_millis() as u64,
                        "loaded server config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        config.with_port_override(env::var(PORT_ENV).ok().as_deref())
    }

    /// Parse the JSON configuration format; absent keys take their defaults.
    pub fn from_json_str(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Port the HTTP server binds on `0.0.0.0`.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Period of the `serverstate` broadcast loop.
    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    fn with_port_override(mut self, value: Option<&str>) -> Self {
        let Some(value) = value else {
            return self;
        };
        match value.parse::<u16>() {
            Ok(port) => self.port = port,
            Err(err) => warn!(value, error = %err, "ignoring invalid {PORT_ENV} override"),
        }
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PORT, DEFAULT_TICK_PERIOD)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    port: Option<u16>,
    tick_period_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self::new(
            value.port.unwrap_or(DEFAULT_PORT),
            value
                .tick_period_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TICK_PERIOD),
        )
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.port(), 8080);
        assert_eq!(config.tick_period(), Duration::from_millis(16));
    }

    #[test]
    fn parses_camel_case_keys() {
        let config = AppConfig::from_json_str(r#"{"port": 3000, "tickPeriodMs": 50}"#).unwrap();
        assert_eq!(config, AppConfig::new(3000, Duration::from_millis(50)));
    }

    #[test]
    fn missing_keys_fall_back() {
        let config = AppConfig::from_json_str(r#"{"tickPeriodMs": 33}"#).unwrap();
        assert_eq!(config.port(), DEFAULT_PORT);
        assert_eq!(config.tick_period(), Duration::from_millis(33));
    }

    #[test]
    fn zero_period_is_clamped() {
        let config = AppConfig::from_json_str(r#"{"tickPeriodMs": 0}"#).unwrap();
        assert_eq!(config.tick_period(), MIN_TICK_PERIOD);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(AppConfig::from_json_str("{port: nope}").is_err());
    }

    #[test]
    fn port_override() {
        let config = AppConfig::default().with_port_override(Some("9001"));
        assert_eq!(config.port(), 9001);

        let config = AppConfig::default().with_port_override(Some("not-a-port"));
        assert_eq!(config.port(), DEFAULT_PORT);

        let config = AppConfig::default().with_port_override(None);
        assert_eq!(config.port(), DEFAULT_PORT);
    }
}
