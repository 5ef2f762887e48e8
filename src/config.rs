//! Configuration management for the PDF preview server

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub render: RenderConfig,
    pub events: EventsConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root holding one directory per session
    pub artifacts_dir: PathBuf,
    /// Ceiling on a multipart upload body
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub dpi: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct EventsConfig {
    pub poll_interval_ms: u64,
    /// Zero disables keep-alive comments
    pub keepalive_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Zero disables sweeping idle sessions
    pub ttl_hours: u64,
    pub sweep_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            storage: StorageConfig {
                artifacts_dir: PathBuf::from("artifacts"),
                max_upload_bytes: 32 << 20,
            },
            render: RenderConfig {
                dpi: 300.0,
                timeout_secs: 120,
            },
            events: EventsConfig {
                poll_interval_ms: 1000,
                keepalive_secs: 15,
            },
            session: SessionConfig {
                ttl_hours: 48,
                sweep_interval_secs: 3600,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; absent keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: lookup("SERVER_HOST_IP").unwrap_or(defaults.server.host),
                port: parse_var(&lookup, "SERVER_PORT", defaults.server.port)?,
            },
            storage: StorageConfig {
                artifacts_dir: lookup("ARTIFACTS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.artifacts_dir),
                max_upload_bytes: parse_var(
                    &lookup,
                    "MAX_UPLOAD_BYTES",
                    defaults.storage.max_upload_bytes,
                )?,
            },
            render: RenderConfig {
                dpi: parse_var(&lookup, "PREVIEW_DPI", defaults.render.dpi)?,
                timeout_secs: parse_var(&lookup, "RENDER_TIMEOUT_SECS", defaults.render.timeout_secs)?,
            },
            events: EventsConfig {
                poll_interval_ms: parse_var(
                    &lookup,
                    "EVENTS_POLL_INTERVAL_MS",
                    defaults.events.poll_interval_ms,
                )?,
                keepalive_secs: parse_var(
                    &lookup,
                    "EVENTS_KEEPALIVE_SECS",
                    defaults.events.keepalive_secs,
                )?,
            },
            session: SessionConfig {
                ttl_hours: parse_var(&lookup, "SESSION_TTL_HOURS", defaults.session.ttl_hours)?,
                sweep_interval_secs: parse_var(
                    &lookup,
                    "SESSION_SWEEP_INTERVAL_SECS",
                    defaults.session.sweep_interval_secs,
                )?,
            },
        })
    }

    /// `host:port` for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero tick would spin the stream
        Duration::from_millis(self.events.poll_interval_ms.max(1))
    }

    pub fn keepalive(&self) -> Option<Duration> {
        (self.events.keepalive_secs > 0).then(|| Duration::from_secs(self.events.keepalive_secs))
    }

    pub fn session_ttl(&self) -> Option<Duration> {
        (self.session.ttl_hours > 0).then(|| Duration::from_secs(self.session.ttl_hours * 3600))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session.sweep_interval_secs.max(1))
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
