// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Process Supervisor: reconciler loop, health loop, spawn/exit/stop
//! workers, and the lookup API consumed by the Gateway.

use crate::backoff::restart_delay;
use crate::desired_state::DesiredStateSource;
use crate::error::LookupError;
use crate::health::{Probe, ProbeOutcome};
use crate::process::{decide_health_transition, HealthTransition, ManagedProcess};
use crate::port_allocator::PortAllocator;
use chrono::Utc;
use nexushub_core::{AppInstance, ProcessState};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Tunables, all with spec-given defaults (§6 Configuration values).
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub health_interval: Duration,
    pub health_request_timeout: Duration,
    pub consecutive_failures: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub graceful_period: Duration,
    pub subprocess_cwd: PathBuf,
    pub internal_secret: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            health_interval: Duration::from_secs(5),
            health_request_timeout: Duration::from_secs(2),
            consecutive_failures: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            graceful_period: Duration::from_secs(10),
            subprocess_cwd: PathBuf::from("."),
            internal_secret: String::new(),
        }
    }
}

/// Owns the `actualState` map and the two persistent loops. Cheap to
/// clone (all state is behind `Arc`); the Gateway is expected to hold a
/// clone as a non-owning lookup handle.
#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<Inner>,
}

struct Inner {
    actual: parking_lot::Mutex<HashMap<String, Arc<ManagedProcess>>>,
    desired_state: Arc<DesiredStateSource>,
    port_allocator: Arc<PortAllocator>,
    prober: Arc<dyn Probe>,
    config: SupervisorConfig,
    shutdown: watch::Sender<bool>,
    first_reconcile_fired: AtomicBool,
    on_first_reconcile: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl ProcessSupervisor {
    pub fn new(
        desired_state: Arc<DesiredStateSource>,
        port_allocator: Arc<PortAllocator>,
        prober: Arc<dyn Probe>,
        config: SupervisorConfig,
        on_first_reconcile: Option<Arc<dyn Fn() + Send + Sync>>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                actual: parking_lot::Mutex::new(HashMap::new()),
                desired_state,
                port_allocator,
                prober,
                config,
                shutdown,
                first_reconcile_fired: AtomicBool::new(false),
                on_first_reconcile,
            }),
        }
    }

    /// Spawns the reconciler and health loops as background tasks. The
    /// reconciler also runs once synchronously before returning, so a
    /// fresh supervisor has attempted its first reconcile immediately.
    pub async fn run(&self) {
        self.reconcile_once().await;

        let reconciler = self.clone();
        tokio::spawn(async move { reconciler.reconcile_loop().await });

        let health = self.clone();
        tokio::spawn(async move { health.health_loop().await });
    }

    /// Signals all loops and workers to stop within one tick.
    pub fn shutdown(&self) {
        let _ = self.inner.shutdown.send(true);
    }

    fn is_shutting_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    async fn reconcile_loop(&self) {
        let mut rx = self.inner.shutdown.subscribe();
        let mut ticker = tokio::time::interval(self.inner.config.health_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.reconcile_once().await,
                _ = rx.changed() => if *rx.borrow() { return },
            }
        }
    }

    async fn health_loop(&self) {
        let mut rx = self.inner.shutdown.subscribe();
        let mut ticker = tokio::time::interval(self.inner.config.health_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.health_tick().await,
                _ = rx.changed() => if *rx.borrow() { return },
            }
        }
    }

    /// One reconciliation pass: diff desired vs actual, spawn/stop as
    /// needed, then fire the first-reconcile callback if this pass is
    /// the first where actual matches desired and every entry is
    /// Running.
    async fn reconcile_once(&self) {
        let desired = self.inner.desired_state.list();
        let desired_ids: std::collections::HashSet<String> =
            desired.iter().map(|i| i.instance_id.as_str().to_string()).collect();

        let existing: Vec<(String, Arc<ManagedProcess>)> = {
            let actual = self.inner.actual.lock();
            actual.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        let existing_ids: std::collections::HashSet<String> =
            existing.iter().map(|(k, _)| k.clone()).collect();

        for instance in &desired {
            let id = instance.instance_id.as_str().to_string();
            match existing.iter().find(|(k, _)| *k == id) {
                None => self.spawn_instance(instance.clone()),
                Some((_, entry)) => {
                    let state = entry.state();
                    if matches!(state, ProcessState::Stopped | ProcessState::Failed) {
                        self.spawn_instance(instance.clone());
                    } else if entry.instance.lock().package_path != instance.package_path {
                        info!(instance_id = %id, "package_path changed, stopping for respawn");
                        self.stop(entry.clone(), id, true);
                    }
                }
            }
        }

        for (id, entry) in &existing {
            if !desired_ids.contains(id) {
                let state = entry.state();
                if matches!(state, ProcessState::Starting | ProcessState::Running | ProcessState::Unhealthy) {
                    info!(instance_id = %id, "no longer desired, stopping");
                    self.stop(entry.clone(), id.clone(), true);
                }
            }
        }

        if existing_ids == desired_ids && !desired.is_empty() {
            let all_running = {
                let actual = self.inner.actual.lock();
                desired_ids.iter().all(|id| actual.get(id).is_some_and(|e| e.state() == ProcessState::Running))
            };

            if all_running
                && self
                    .inner
                    .first_reconcile_fired
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            {
                if let Some(cb) = self.inner.on_first_reconcile.clone() {
                    tokio::spawn(async move {
                        let result = std::panic::catch_unwind(AssertUnwindSafe(|| cb()));
                        if let Err(payload) = result {
                            let message = payload
                                .downcast_ref::<&str>()
                                .map(|s| s.to_string())
                                .or_else(|| payload.downcast_ref::<String>().cloned())
                                .unwrap_or_else(|| "non-string panic payload".to_string());
                            error!(message, "first-reconcile callback panicked");
                        }
                    });
                }
            }
        }
    }

    /// §4.3.1 spawning, run as a detached worker per the spec's "must
    /// not block the reconciler" requirement.
    fn spawn_instance(&self, instance: AppInstance) {
        let this = self.clone();
        tokio::spawn(async move { this.spawn_instance_inner(instance).await });
    }

    async fn spawn_instance_inner(&self, instance: AppInstance) {
        let id = instance.instance_id.as_str().to_string();

        let entry = {
            let mut actual = self.inner.actual.lock();
            match actual.get(&id) {
                Some(entry) => {
                    let state = entry.state();
                    if matches!(state, ProcessState::Running | ProcessState::Starting) {
                        return;
                    }
                    entry.clone()
                }
                None => {
                    let entry = Arc::new(ManagedProcess::new(instance.clone()));
                    actual.insert(id.clone(), entry.clone());
                    entry
                }
            }
        };

        let restart_count = {
            let mut status = entry.status.lock();
            if status.state == ProcessState::Stopped || status.state == ProcessState::Failed {
                status.restart_count += 1;
            }
            status.state = ProcessState::Starting;
            status.restart_count
        };

        let delay = restart_delay(self.inner.config.initial_backoff, self.inner.config.max_backoff, restart_count);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let port = match self.inner.port_allocator.allocate() {
            Ok(port) => port,
            Err(e) => {
                warn!(instance_id = %id, error = %e, "no port available, marking Failed");
                entry.status.lock().state = ProcessState::Failed;
                return;
            }
        };

        let binary = instance.binary_path();
        let db_name = format!("{id}.db");
        let mut cmd = Command::new(&binary);
        cmd.arg("-dbPath")
            .arg(&db_name)
            .arg("-port")
            .arg(port.to_string())
            .current_dir(&self.inner.config.subprocess_cwd)
            .env("INTERNAL_SECRET", &self.inner.config.internal_secret)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(host) = &instance.host_name {
            cmd.env("HOST", host);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(instance_id = %id, error = %e, "failed to start child");
                self.inner.port_allocator.release(port);
                entry.status.lock().state = ProcessState::Failed;
                return;
            }
        };

        if let Some(stdout) = child.stdout.take() {
            spawn_log_reader(id.clone(), "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_log_reader(id.clone(), "stderr", stderr);
        }

        let pid = child.id();
        {
            let mut status = entry.status.lock();
            status.pid = pid;
            status.port = Some(port);
            status.state = ProcessState::Running;
            status.start_time = Some(Utc::now());
        }

        info!(instance_id = %id, port, pid, "instance started");

        *entry.child.lock().await = Some(child);

        let this = self.clone();
        let wait_id = id.clone();
        tokio::spawn(async move { this.wait_worker(wait_id, entry).await });
    }

    async fn wait_worker(&self, id: String, entry: Arc<ManagedProcess>) {
        let status_opt = {
            let mut guard = entry.child.lock().await;
            match guard.as_mut() {
                Some(child) => child.wait().await.ok(),
                None => return,
            }
        };

        *entry.child.lock().await = None;

        let previous_state = entry.state();
        if !matches!(previous_state, ProcessState::Stopping | ProcessState::Stopped) {
            if let Some(port) = entry.status.lock().port.take() {
                self.inner.port_allocator.release(port);
            }
        }

        entry.status.lock().state = ProcessState::Failed;

        info!(instance_id = %id, exit_status = ?status_opt, "child exited");

        if self.is_shutting_down() {
            return;
        }

        let still_desired = self
            .inner
            .desired_state
            .list()
            .iter()
            .any(|i| i.instance_id.as_str() == id);

        if !still_desired {
            self.inner.actual.lock().remove(&id);
            return;
        }

        let instance = entry.instance.lock().clone();
        self.spawn_instance(instance);
    }

    /// §4.3.3 stop: SIGTERM (via drop-triggered kill for the graceful
    /// phase is not honored by tokio, so a direct `start_kill` stands in
    /// for the platform terminate signal followed by an unconditional
    /// kill after `graceful_period`).
    fn stop(&self, entry: Arc<ManagedProcess>, id: String, remove: bool) {
        let this = self.clone();
        tokio::spawn(async move { this.stop_inner(entry, id, remove).await });
    }

    async fn stop_inner(&self, entry: Arc<ManagedProcess>, id: String, remove: bool) {
        entry.status.lock().state = ProcessState::Stopping;

        {
            let mut guard = entry.child.lock().await;
            if let Some(child) = guard.as_mut() {
                let _ = child.start_kill();
            }
        }

        let graceful = tokio::time::timeout(self.inner.config.graceful_period, async {
            loop {
                if entry.child.lock().await.is_none() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        if graceful.is_err() {
            warn!(instance_id = %id, "graceful stop timed out, escalating");
            let mut guard = entry.child.lock().await;
            if let Some(child) = guard.as_mut() {
                let _ = child.kill().await;
            }
        }

        if let Some(port) = entry.status.lock().port.take() {
            self.inner.port_allocator.release(port);
        }
        entry.status.lock().state = ProcessState::Stopped;

        if remove {
            self.inner.actual.lock().remove(&id);
        }

        info!(instance_id = %id, "instance stopped");
    }

    /// `get_by_id(id) -> (instance, port)`: only returns entries in
    /// `Running`.
    pub fn get_by_id(&self, id: &str) -> Result<(AppInstance, u16), LookupError> {
        let actual = self.inner.actual.lock();
        let entry = actual.get(id).ok_or_else(|| LookupError::NotFound(id.to_string()))?;
        let status = entry.status.lock();
        if status.state != ProcessState::Running {
            return Err(LookupError::NotRunning {
                id: id.to_string(),
                state: status.state.to_string(),
            });
        }
        let port = status.port.ok_or_else(|| LookupError::NotRunning {
            id: id.to_string(),
            state: status.state.to_string(),
        })?;
        Ok((entry.instance.lock().clone(), port))
    }

    pub fn get_by_host(&self, host: &str) -> Result<(AppInstance, u16), LookupError> {
        let id = {
            let actual = self.inner.actual.lock();
            actual
                .iter()
                .find(|(_, entry)| entry.instance.lock().host_name.as_deref() == Some(host))
                .map(|(id, _)| id.clone())
                .ok_or_else(|| LookupError::NotFound(host.to_string()))?
        };
        self.get_by_id(&id)
    }

    /// Gateway-facing cold-start wait: retries `get_by_id` with
    /// exponential backoff bounded by `timeout` (spec default 30s).
    pub async fn get_by_id_with_wait(&self, id: &str, timeout: Duration) -> Result<(AppInstance, u16), LookupError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut delay = Duration::from_millis(50);

        loop {
            match self.get_by_id(id) {
                Ok(result) => return Ok(result),
                Err(LookupError::NotFound(_)) => return Err(LookupError::NotFound(id.to_string())),
                Err(_not_running) => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(LookupError::ColdStartTimeout(id.to_string()));
                    }
                    let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                    tokio::time::sleep(delay.min(remaining)).await;
                    delay = (delay * 2).min(Duration::from_secs(2));
                }
            }
        }
    }

    async fn health_tick(&self) {
        let entries: Vec<(String, Arc<ManagedProcess>)> = {
            let actual = self.inner.actual.lock();
            actual
                .iter()
                .filter(|(_, e)| {
                    matches!(e.state(), ProcessState::Starting | ProcessState::Running | ProcessState::Unhealthy)
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };

        for (id, entry) in entries {
            let port = entry.status.lock().port;
            let Some(port) = port else { continue };

            let outcome = self.inner.prober.check(port).await;
            let now = Utc::now();
            let window = chrono::Duration::from_std(
                self.inner.config.health_interval * self.inner.config.consecutive_failures,
            )
            .unwrap_or_default();

            let (state, unhealthy_since) = {
                let status = entry.status.lock();
                (status.state, status.unhealthy_since)
            };

            let transition = decide_health_transition(state, unhealthy_since, outcome, now, window);

            match transition {
                HealthTransition::Unchanged => {}
                HealthTransition::BecameRunning => {
                    let mut status = entry.status.lock();
                    status.state = ProcessState::Running;
                    status.last_healthy_time = Some(now);
                    status.unhealthy_since = None;
                    status.restart_count = 0;
                    debug!(instance_id = %id, "health: recovered to Running");
                }
                HealthTransition::BecameUnhealthy => {
                    let mut status = entry.status.lock();
                    status.state = ProcessState::Unhealthy;
                    if status.unhealthy_since.is_none() {
                        status.unhealthy_since = Some(now);
                    }
                    debug!(instance_id = %id, outcome = ?outcome, "health: became Unhealthy");
                }
                HealthTransition::BecameFailed => {
                    warn!(instance_id = %id, "health: unhealthy too long, marking Failed");
                    if let Some(port) = entry.status.lock().port.take() {
                        self.inner.port_allocator.release(port);
                    }
                    entry.status.lock().state = ProcessState::Failed;
                    self.spawn_instance(entry.instance.lock().clone());
                }
            }
        }
    }
}

fn spawn_log_reader(instance_id: String, stream: &'static str, reader: impl tokio::io::AsyncRead + Unpin + Send + 'static) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(instance_id = %instance_id, stream, "{line}");
        }
    });
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
