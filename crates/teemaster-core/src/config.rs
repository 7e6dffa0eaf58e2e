//! Configuration system for TeeMaster.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $TEEMASTER_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/teemaster/config.toml
//!   3. ~/.config/teemaster/config.toml
//!
//! The loaded value is validated once and then shared read-only for the
//! lifetime of the process.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    pub http: HttpConfig,
    pub heartbeat: HeartbeatConfig,
    pub probe: ProbeConfig,
    pub federation: FederationConfig,
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Address the API binds to.
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Lifetime granted by a registration or heartbeat.
    pub interval_secs: u64,
    /// Minimum spacing between two accepted heartbeats.
    pub min_wait_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// How long the reachability check waits for a reply.
    pub socket_timeout_secs: u64,
    /// Probe new registrations before admitting them.
    pub gate_registration: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FederationConfig {
    /// Cache key this instance publishes under.
    pub server_identifier: String,
    /// Cache keys of the other instances to merge into listings.
    pub peers: Vec<String>,
    /// Redis URL of the shared cache. Empty = in-process cache (no federation).
    pub cache_url: String,
    pub cache_timeout_millis: u64,
    /// Registrations inside this window share one publish.
    pub publish_debounce_millis: u64,
    /// Period of the republish + peer refresh task. 0 = disabled.
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Period of the expired-entry reaper. 0 = disabled.
    pub reap_interval_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8283,
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: 90,
            min_wait_secs: 70,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            socket_timeout_secs: 5,
            gate_registration: false,
        }
    }
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            server_identifier: "Master".to_string(),
            peers: Vec::new(),
            cache_url: String::new(),
            cache_timeout_millis: 2000,
            publish_debounce_millis: 500,
            refresh_interval_secs: 30,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reap_interval_secs: 30,
        }
    }
}

// ── Typed accessors ───────────────────────────────────────────────────────────

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn min_wait(&self) -> Duration {
        Duration::from_secs(self.min_wait_secs)
    }
}

impl ProbeConfig {
    pub fn socket_timeout(&self) -> Duration {
        Duration::from_secs(self.socket_timeout_secs)
    }
}

impl FederationConfig {
    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_millis)
    }

    pub fn publish_debounce(&self) -> Duration {
        Duration::from_millis(self.publish_debounce_millis)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("teemaster")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl MasterConfig {
    /// Load config: env vars → file → defaults, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            Self::from_toml(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            MasterConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("TEEMASTER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&MasterConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply TEEMASTER_* overrides. `lookup` is `std::env::var` in
    /// production; tests pass a map so the process environment stays alone.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TEEMASTER_HTTP__BIND") {
            self.http.bind = v;
        }
        if let Some(p) = lookup("TEEMASTER_HTTP__PORT").and_then(|v| v.parse().ok()) {
            self.http.port = p;
        }
        if let Some(s) = lookup("TEEMASTER_HEARTBEAT__INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.heartbeat.interval_secs = s;
        }
        if let Some(s) = lookup("TEEMASTER_HEARTBEAT__MIN_WAIT_SECS").and_then(|v| v.parse().ok()) {
            self.heartbeat.min_wait_secs = s;
        }
        if let Some(v) = lookup("TEEMASTER_PROBE__GATE_REGISTRATION") {
            self.probe.gate_registration = v == "true" || v == "1";
        }
        if let Some(v) = lookup("TEEMASTER_FEDERATION__SERVER_IDENTIFIER") {
            self.federation.server_identifier = v;
        }
        if let Some(v) = lookup("TEEMASTER_FEDERATION__PEERS") {
            self.federation.peers = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("TEEMASTER_FEDERATION__CACHE_URL") {
            self.federation.cache_url = v;
        }
    }

    /// Reject configurations the heartbeat and federation logic cannot run
    /// with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat.interval_secs == 0 {
            return invalid("heartbeat.interval_secs must be > 0");
        }
        // With min_wait == interval the renewal window only opens at expiry.
        if self.heartbeat.min_wait_secs >= self.heartbeat.interval_secs {
            return invalid("heartbeat.min_wait_secs must be below heartbeat.interval_secs");
        }
        if self.probe.socket_timeout_secs == 0 {
            return invalid("probe.socket_timeout_secs must be > 0");
        }
        if self.federation.cache_timeout_millis == 0 {
            return invalid("federation.cache_timeout_millis must be > 0");
        }
        let ident = &self.federation.server_identifier;
        if ident.trim().is_empty() {
            return invalid("federation.server_identifier must not be empty");
        }
        if self.federation.peers.iter().any(|p| p == ident) {
            return invalid("federation.peers must not contain this instance's identifier");
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid(msg.to_string()))
}
