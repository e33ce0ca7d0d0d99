// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NexusHub daemon (`nexushubd`)
//!
//! Process entry point: loads configuration, wires the Process
//! Supervisor, the durable Event Store, and the TLS-terminating Routing
//! Gateway together behind one listener, and owns the process's signal
//! handling and background durability tasks.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use config::{Config, ConfigError};
use fs2::FileExt;
use nexushub_gateway::{AccessTokenCache, AppState, DebugSurface, GatewayConfig};
use nexushub_storage::EventStore;
use nexushub_supervisor::{
    ActiveTtlSource, DebugEphemeralSource, DesiredStateSource, HealthProber, PortAllocator,
    ProcessSupervisor, StaticSource, SupervisorConfig,
};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("nexushubd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: nexushubd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;

    std::fs::create_dir_all(&config.state_dir)?;
    let lock_file = match acquire_lock(&config.lock_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("nexushubd is already running: {e}");
            std::process::exit(1);
        }
    };

    rotate_log_if_needed(&config.log_path);
    write_startup_marker(&config)?;
    let log_guard = setup_logging(&config)?;

    info!("starting NexusHub daemon");

    if let Err(e) = run(config.clone()).await {
        write_startup_error(&config, &e.to_string());
        error!("daemon exited with error: {}", e);
        drop(log_guard);
        return Err(e);
    }

    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
    drop(lock_file);
    info!("daemon stopped");
    Ok(())
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&config.package_store_dir)?;
    std::fs::create_dir_all(&config.debug_package_store_dir)?;
    if let Some(parent) = config.wal_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let event_store =
        EventStore::open(&config.wal_path, &config.snapshot_path)?.with_checkpointer(config.snapshot_path.clone())?;
    let event_store = Arc::new(parking_lot::Mutex::new(event_store));

    let active_ttl = Arc::new(ActiveTtlSource::new());
    let debug_ephemeral = Arc::new(DebugEphemeralSource::new());
    let desired_state = Arc::new(DesiredStateSource::new(vec![
        Box::new(StaticSource::new(config.static_instances.clone())),
        Box::new(active_ttl.clone()),
        Box::new(debug_ephemeral.clone()),
    ]));

    let port_allocator = Arc::new(PortAllocator::new(config.port_range.0, config.port_range.1));
    let supervisor_config = SupervisorConfig {
        health_interval: config.health_interval,
        health_request_timeout: config.health_request_timeout,
        consecutive_failures: config.consecutive_failures,
        initial_backoff: config.initial_backoff,
        max_backoff: config.max_backoff,
        graceful_period: config.graceful_period,
        subprocess_cwd: config.subprocess_cwd.clone(),
        internal_secret: config.internal_secret.clone(),
    };

    let supervisor = ProcessSupervisor::new(
        desired_state.clone(),
        port_allocator,
        Arc::new(HealthProber::new(config.health_request_timeout)),
        supervisor_config,
        None,
    );
    supervisor.run().await;

    let gateway_config = Arc::new(GatewayConfig {
        internal_secret: config.internal_secret.clone(),
        admin_instance_id: config.admin_instance_id.clone().into(),
        cold_start_timeout: config.cold_start_timeout,
        fanout_timeout: config.health_request_timeout,
        package_store_dir: config.package_store_dir.clone(),
        access_token_ttl: config.access_token_ttl,
        session_ttl: config.session_ttl,
    });

    let debug_surface = Arc::new(DebugSurface::new(config.debug_package_store_dir.clone()));

    let state = AppState {
        supervisor: supervisor.clone(),
        desired_state,
        active_ttl,
        debug_ephemeral: Arc::clone(&debug_ephemeral),
        event_store: Arc::clone(&event_store),
        access_tokens: Arc::new(AccessTokenCache::new()),
        debug_surface: Arc::clone(&debug_surface),
        http: reqwest::Client::new(),
        config: gateway_config,
    };

    let tls = nexushub_gateway::tls::load_rustls_config(&config.tls_cert_path, &config.tls_key_path).await?;

    spawn_checkpoint(Arc::clone(&event_store));
    spawn_flush_task(Arc::clone(&event_store));
    spawn_debug_sweep(debug_ephemeral, debug_surface);

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let addr = config.listen_addr;
    let serve_state = state.clone();
    let server = tokio::spawn(async move { nexushub_gateway::serve(addr, tls, serve_state).await });

    info!(addr = %addr, "gateway ready");
    println!("READY");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down..."),
        _ = sigint.recv() => info!("received SIGINT, shutting down..."),
        result = server => {
            match result {
                Ok(Ok(())) => info!("gateway server exited"),
                Ok(Err(e)) => error!("gateway server exited with error: {}", e),
                Err(e) => error!("gateway server task panicked: {}", e),
            }
        }
    }

    supervisor.shutdown();
    if let Err(e) = event_store.lock().flush() {
        error!(error = %e, "failed to flush event store during shutdown");
    }

    Ok(())
}

fn print_help() {
    println!("nexushubd {}", env!("CARGO_PKG_VERSION"));
    println!("NexusHub daemon — process supervisor, routing gateway, and event bus");
    println!();
    println!("USAGE:");
    println!("    nexushubd");
    println!();
    println!("Configuration is read from $NEXUSHUB_CONFIG, or else");
    println!("<config_dir>/nexushub/config.toml. Every setting has a default.");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
}

/// Acquire the single-instance lock file, writing our PID into it once held.
fn acquire_lock(path: &Path) -> std::io::Result<std::fs::File> {
    let file = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(path)?;
    file.try_lock_exclusive()
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::AddrInUse, "lock already held"))?;
    file.set_len(0)?;
    let mut file = file;
    writeln!(file, "{}", std::process::id())?;
    Ok(file)
}

/// Checkpoint interval (60 seconds), matching §9's checkpoint cadence.
const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically materialize the event store's indices to disk and
/// truncate the WAL through the checkpointed sequence.
fn spawn_checkpoint(event_store: Arc<parking_lot::Mutex<EventStore>>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHECKPOINT_INTERVAL);
        loop {
            interval.tick().await;
            let store = Arc::clone(&event_store);
            let result = tokio::task::spawn_blocking(move || store.lock().checkpoint()).await;
            match result {
                Ok(Ok(())) => tracing::debug!("checkpoint complete"),
                Ok(Err(e)) => tracing::warn!(error = %e, "checkpoint failed"),
                Err(e) => tracing::warn!(error = %e, "checkpoint task panicked"),
            }
        }
    });
}

/// Flush interval for group commit (~10ms durability window).
const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

fn spawn_flush_task(event_store: Arc<parking_lot::Mutex<EventStore>>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(FLUSH_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = event_store.lock().maybe_flush() {
                tracing::error!(error = %e, "failed to flush event store");
            }
        }
    });
}

/// Debug-ephemeral sweep interval; fine-grained enough relative to the
/// hour-long inactivity timeout (§4.9) without polling tightly.
const DEBUG_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically reap debug-ephemeral instances whose inactivity timer has
/// elapsed: drop them from the desired set (the reconciler stops the
/// process within one tick), remove the debug surface's record, and
/// delete the uploaded package file.
fn spawn_debug_sweep(debug_ephemeral: Arc<DebugEphemeralSource>, debug_surface: Arc<DebugSurface>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(DEBUG_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let now = Utc::now();
            for instance in debug_ephemeral.expired(now) {
                let id = instance.instance_id.as_str().to_string();
                debug_ephemeral.remove(&id);
                if let Some(record) = debug_surface.remove(&id) {
                    if let Some(path) = record.uploaded_path {
                        if let Err(e) = std::fs::remove_file(&path) {
                            tracing::warn!(instance_id = %id, error = %e, "failed to delete expired debug upload");
                        }
                    }
                }
                tracing::info!(instance_id = %id, "reaped expired debug instance");
            }
        }
    });
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (daemon.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`]. Best-effort:
/// rotation failures are silently ignored so the daemon still starts.
fn rotate_log_if_needed(log_path: &Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

const STARTUP_MARKER_PREFIX: &str = "--- nexushubd: starting (pid: ";

fn write_startup_marker(config: &Config) -> std::io::Result<()> {
    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&config.log_path)?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

fn write_startup_error(config: &Config, error: &str) {
    let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(&config.log_path) else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard, ConfigError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Read { path: config.log_path.clone(), source })?;
    }

    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(ConfigError::NoConfigDir)?,
        config.log_path.file_name().ok_or(ConfigError::NoConfigDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();

    Ok(guard)
}
