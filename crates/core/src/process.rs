// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime bookkeeping for a live (or recently live) application instance.
//!
//! This module holds only the pure data side of a `ManagedProcess` — the
//! OS child handle and the worker tasks that drive transitions live in
//! `nexushub-supervisor`, which composes this state with a real
//! `tokio::process::Child`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a managed child process.
///
/// Invariants (enforced by the supervisor, not this type):
/// - `pid != 0` iff `state` is one of `Starting | Running | Unhealthy | Stopping`.
/// - a port is held exactly while `state` is one of the same four states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Unknown,
    Starting,
    Running,
    Unhealthy,
    Stopping,
    Stopped,
    Failed,
}

impl ProcessState {
    /// Whether a process in this state holds a port and a live child handle.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            ProcessState::Starting
                | ProcessState::Running
                | ProcessState::Unhealthy
                | ProcessState::Stopping
        )
    }

    /// Whether a process in this state is eligible to be looked up by the
    /// gateway (only `Running` satisfies callers per §4.3.4).
    pub fn is_routable(self) -> bool {
        matches!(self, ProcessState::Running)
    }

    /// Whether a reconciliation pass should (re)spawn an instance currently
    /// in this state.
    pub fn needs_spawn(self) -> bool {
        matches!(self, ProcessState::Stopped | ProcessState::Failed)
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProcessState::Unknown => "unknown",
            ProcessState::Starting => "starting",
            ProcessState::Running => "running",
            ProcessState::Unhealthy => "unhealthy",
            ProcessState::Stopping => "stopping",
            ProcessState::Stopped => "stopped",
            ProcessState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Point-in-time snapshot of one managed process's bookkeeping fields,
/// suitable for status reporting and for the gateway's lookup API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub pid: Option<u32>,
    pub port: Option<u16>,
    pub state: ProcessState,
    pub start_time: Option<DateTime<Utc>>,
    pub last_healthy_time: Option<DateTime<Utc>>,
    /// Zero (`None`) iff `state != Unhealthy`.
    pub unhealthy_since: Option<DateTime<Utc>>,
    pub restart_count: u32,
}

impl ProcessStatus {
    pub fn new() -> Self {
        Self {
            pid: None,
            port: None,
            state: ProcessState::Unknown,
            start_time: None,
            last_healthy_time: None,
            unhealthy_since: None,
            restart_count: 0,
        }
    }
}

impl Default for ProcessStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_running_is_routable() {
        for state in [
            ProcessState::Unknown,
            ProcessState::Starting,
            ProcessState::Unhealthy,
            ProcessState::Stopping,
            ProcessState::Stopped,
            ProcessState::Failed,
        ] {
            assert!(!state.is_routable(), "{state} should not be routable");
        }
        assert!(ProcessState::Running.is_routable());
    }

    #[test]
    fn live_states_match_spec_invariant() {
        assert!(ProcessState::Starting.is_live());
        assert!(ProcessState::Running.is_live());
        assert!(ProcessState::Unhealthy.is_live());
        assert!(ProcessState::Stopping.is_live());
        assert!(!ProcessState::Stopped.is_live());
        assert!(!ProcessState::Failed.is_live());
        assert!(!ProcessState::Unknown.is_live());
    }

    #[test]
    fn needs_spawn_only_for_terminal_states() {
        assert!(ProcessState::Stopped.needs_spawn());
        assert!(ProcessState::Failed.needs_spawn());
        assert!(!ProcessState::Running.needs_spawn());
    }
}
