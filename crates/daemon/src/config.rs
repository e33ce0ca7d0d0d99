// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration (§6's "Configuration values" table), loaded from
//! a TOML file rather than the fixed-path convention this crate used to
//! follow: NexusHub's desired-state set (which tenant instances exist at
//! all) has to be operator-editable, not baked into a code path.

use nexushub_core::AppInstance;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine a config directory; set NEXUSHUB_CONFIG to an explicit file path")]
    NoConfigDir,
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("invalid port range: min {min} must be less than max {max}")]
    InvalidPortRange { min: u16, max: u16 },
}

/// On-disk shape of the config file. Every field is optional; absent
/// fields fall back to the defaults named in §6.
#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    state_dir: Option<PathBuf>,
    listen_addr: Option<SocketAddr>,
    tls_cert_path: Option<PathBuf>,
    tls_key_path: Option<PathBuf>,
    port_range_min: Option<u16>,
    port_range_max: Option<u16>,
    health_interval_secs: Option<u64>,
    health_request_timeout_secs: Option<u64>,
    consecutive_failures: Option<u32>,
    initial_backoff_secs: Option<u64>,
    max_backoff_secs: Option<u64>,
    graceful_period_secs: Option<u64>,
    cold_start_timeout_secs: Option<u64>,
    subprocess_cwd: Option<PathBuf>,
    admin_instance_id: Option<String>,
    internal_secret: Option<String>,
    session_ttl_hours: Option<i64>,
    access_token_ttl_minutes: Option<i64>,
    poll_interval_millis: Option<u64>,
    #[serde(default)]
    static_instances: Vec<RawInstance>,
}

#[derive(Debug, Deserialize)]
struct RawInstance {
    instance_id: String,
    package_path: PathBuf,
}

/// Fully resolved daemon configuration; every field has a concrete
/// value once this is built, so the rest of the daemon never consults
/// a default again.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub listen_addr: SocketAddr,
    pub tls_cert_path: PathBuf,
    pub tls_key_path: PathBuf,
    pub port_range: (u16, u16),
    pub health_interval: Duration,
    pub health_request_timeout: Duration,
    pub consecutive_failures: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub graceful_period: Duration,
    pub cold_start_timeout: Duration,
    pub subprocess_cwd: PathBuf,
    pub admin_instance_id: String,
    pub internal_secret: String,
    pub session_ttl: chrono::Duration,
    pub access_token_ttl: chrono::Duration,
    pub poll_interval: Duration,
    pub static_instances: Vec<AppInstance>,
    pub log_path: PathBuf,
    pub lock_path: PathBuf,
    pub wal_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub package_store_dir: PathBuf,
    pub debug_package_store_dir: PathBuf,
}

impl Config {
    /// Load from `NEXUSHUB_CONFIG`, if set, else `<config_dir>/nexushub/config.toml`.
    /// A missing file is not fatal: every value in §6's table has a default.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;
        let raw = match std::fs::read_to_string(&path) {
            Ok(text) => {
                toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.clone(), source })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RawConfig::default(),
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let state_dir = raw.state_dir.unwrap_or_else(default_state_dir);
        let port_min = raw.port_range_min.unwrap_or(31000);
        let port_max = raw.port_range_max.unwrap_or(32000);
        if port_min >= port_max {
            return Err(ConfigError::InvalidPortRange { min: port_min, max: port_max });
        }

        let static_instances = raw
            .static_instances
            .into_iter()
            .map(|inst| AppInstance::new(inst.instance_id, inst.package_path))
            .collect();

        Ok(Self {
            listen_addr: raw.listen_addr.unwrap_or(SocketAddr::from(([0, 0, 0, 0], 8443))),
            tls_cert_path: raw.tls_cert_path.unwrap_or_else(|| state_dir.join("tls").join("cert.pem")),
            tls_key_path: raw.tls_key_path.unwrap_or_else(|| state_dir.join("tls").join("key.pem")),
            port_range: (port_min, port_max),
            health_interval: Duration::from_secs(raw.health_interval_secs.unwrap_or(5)),
            health_request_timeout: Duration::from_secs(raw.health_request_timeout_secs.unwrap_or(2)),
            consecutive_failures: raw.consecutive_failures.unwrap_or(3),
            initial_backoff: Duration::from_secs(raw.initial_backoff_secs.unwrap_or(1)),
            max_backoff: Duration::from_secs(raw.max_backoff_secs.unwrap_or(30)),
            graceful_period: Duration::from_secs(raw.graceful_period_secs.unwrap_or(10)),
            cold_start_timeout: Duration::from_secs(raw.cold_start_timeout_secs.unwrap_or(30)),
            subprocess_cwd: raw.subprocess_cwd.unwrap_or_else(|| state_dir.clone()),
            admin_instance_id: raw.admin_instance_id.unwrap_or_else(|| "admin".to_string()),
            internal_secret: raw.internal_secret.unwrap_or_default(),
            session_ttl: chrono::Duration::hours(raw.session_ttl_hours.unwrap_or(24)),
            access_token_ttl: chrono::Duration::minutes(raw.access_token_ttl_minutes.unwrap_or(15)),
            poll_interval: Duration::from_millis(raw.poll_interval_millis.unwrap_or(1000)),
            static_instances,
            log_path: state_dir.join("daemon.log"),
            lock_path: state_dir.join("daemon.pid"),
            wal_path: state_dir.join("events.wal"),
            snapshot_path: state_dir.join("events.snapshot"),
            package_store_dir: state_dir.join("packages"),
            debug_package_store_dir: state_dir.join("debug-packages"),
            state_dir,
        })
    }
}

fn config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var("NEXUSHUB_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("nexushub").join("config.toml"))
}

fn default_state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("NEXUSHUB_STATE_DIR") {
        return PathBuf::from(dir);
    }
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("nexushub")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
