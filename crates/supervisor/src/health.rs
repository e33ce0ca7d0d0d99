// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health probing of a running child's `/api/status` endpoint.
//!
//! The prober holds no state of its own — the supervisor's per-process
//! bookkeeping (`unhealthy_since`, `restart_count`, ...) carries all
//! history, so this is a thin, easily fakeable wrapper for tests.

use std::time::Duration;

/// Outcome of a single probe. Distinct from `ProcessState` because a
/// probe never directly decides a state transition — the supervisor's
/// health loop applies the transition table from §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy,
    Unhealthy,
    Invalid,
}

/// Issues the liveness GET and classifies the result.
#[derive(Clone)]
pub struct HealthProber {
    client: reqwest::Client,
    timeout: Duration,
}

impl HealthProber {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// `check(port)`: GET `http://127.0.0.1:<port>/api/status`.
    /// 200 → Healthy. Any other status or transport error → Unhealthy.
    /// `port == 0` → Invalid without making a request.
    pub async fn check(&self, port: u16) -> ProbeOutcome {
        if port == 0 {
            return ProbeOutcome::Invalid;
        }

        let url = format!("http://127.0.0.1:{port}/api/status");
        match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(resp) if resp.status().is_success() => ProbeOutcome::Healthy,
            Ok(resp) => {
                tracing::debug!(port, status = %resp.status(), "health probe returned non-200");
                ProbeOutcome::Unhealthy
            }
            Err(e) => {
                tracing::debug!(port, error = %e, "health probe transport error");
                ProbeOutcome::Unhealthy
            }
        }
    }
}

/// A pluggable health check, so the supervisor's reconciler/health loop
/// can be tested without binding real sockets.
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, port: u16) -> ProbeOutcome;
}

#[async_trait::async_trait]
impl Probe for HealthProber {
    async fn check(&self, port: u16) -> ProbeOutcome {
        HealthProber::check(self, port).await
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
