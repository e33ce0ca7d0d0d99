// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared dev-only fixtures: a real `ProcessSupervisor` backed by a
//! `/bin/sh` sleep script (same technique as `nexushub-supervisor`'s own
//! tests) plus the rest of `AppState`, wired together for gateway tests.

use crate::access_token_cache::AccessTokenCache;
use crate::debug_surface::DebugSurface;
use crate::state::{AppState, GatewayConfig};
use async_trait::async_trait;
use nexushub_core::AppInstance;
use nexushub_storage::EventStore;
use nexushub_supervisor::{
    ActiveTtlSource, DebugEphemeralSource, DesiredStateSource, PortAllocator, Probe, ProbeOutcome,
    ProcessSupervisor, StaticSource, SupervisorConfig,
};
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub struct AlwaysHealthy;

#[async_trait]
impl Probe for AlwaysHealthy {
    async fn check(&self, _port: u16) -> ProbeOutcome {
        ProbeOutcome::Healthy
    }
}

/// Write a package whose `app/bin/app` is a shell script sleeping for
/// `secs`, matching the directory layout `AppInstance::binary_path` expects.
pub fn sleeping_package(dir: &std::path::Path, instance_id: &str, secs: u32) -> AppInstance {
    let package_path = dir.join(instance_id);
    let bin_dir = package_path.join("app").join("bin");
    std::fs::create_dir_all(&bin_dir).unwrap();
    let bin_path = bin_dir.join("app");
    std::fs::write(&bin_path, format!("#!/bin/sh\nsleep {secs}\n")).unwrap();
    let mut perms = std::fs::metadata(&bin_path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&bin_path, perms).unwrap();

    AppInstance::new(instance_id, package_path)
}

pub struct TestHarness {
    pub state: AppState,
    pub supervisor: ProcessSupervisor,
    pub _tempdir: TempDir,
}

/// Build a harness with a single static admin instance already spawned
/// (sleeping for `admin_secs` so its child stays alive for the test).
pub async fn build_harness(admin_secs: u32) -> TestHarness {
    let dir = tempfile::tempdir().unwrap();
    let admin = sleeping_package(dir.path(), "admin", admin_secs);

    let active_ttl = Arc::new(ActiveTtlSource::new());
    let debug_ephemeral = Arc::new(DebugEphemeralSource::new());
    let desired_state = Arc::new(DesiredStateSource::new(vec![
        Box::new(StaticSource::new(vec![admin])),
        Box::new(active_ttl.clone()),
        Box::new(debug_ephemeral.clone()),
    ]));

    let port_allocator = Arc::new(PortAllocator::new(31500, 31600));
    let supervisor_config = SupervisorConfig {
        health_interval: Duration::from_millis(50),
        health_request_timeout: Duration::from_millis(200),
        consecutive_failures: 3,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(100),
        graceful_period: Duration::from_millis(200),
        subprocess_cwd: std::env::temp_dir(),
        internal_secret: "test-internal-secret".to_string(),
    };

    let supervisor = ProcessSupervisor::new(
        desired_state.clone(),
        port_allocator,
        Arc::new(AlwaysHealthy),
        supervisor_config,
        None,
    );
    supervisor.run().await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    let event_store = EventStore::open(&dir.path().join("events.wal"), &dir.path().join("events.snapshot")).unwrap();

    let config = Arc::new(GatewayConfig {
        internal_secret: "test-internal-secret".to_string(),
        admin_instance_id: "admin".into(),
        cold_start_timeout: Duration::from_millis(500),
        fanout_timeout: Duration::from_millis(500),
        package_store_dir: dir.path().join("packages"),
        access_token_ttl: chrono::Duration::minutes(15),
        session_ttl: chrono::Duration::hours(24),
    });

    let state = AppState {
        supervisor: supervisor.clone(),
        desired_state,
        active_ttl,
        debug_ephemeral,
        event_store: Arc::new(parking_lot::Mutex::new(event_store)),
        access_tokens: Arc::new(AccessTokenCache::new()),
        debug_surface: Arc::new(DebugSurface::new(dir.path().join("debug-packages"))),
        http: reqwest::Client::new(),
        config,
    };

    TestHarness {
        state,
        supervisor,
        _tempdir: dir,
    }
}
