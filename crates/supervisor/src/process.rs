// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ManagedProcess` bookkeeping and the pure health-transition table from
//! §4.3, kept separate from I/O so it can be unit tested directly.

use crate::health::ProbeOutcome;
use chrono::{DateTime, Utc};
use nexushub_core::{AppInstance, ProcessState, ProcessStatus};
use tokio::process::Child;
use tokio::sync::Mutex as AsyncMutex;

/// One entry in the supervisor's `actualState` map.
///
/// `instance` and `status` are each behind their own mutex so the health
/// and reconciler loops can mutate one entry's bookkeeping without
/// holding the coarse map lock during probe or spawn I/O.
pub struct ManagedProcess {
    pub instance: parking_lot::Mutex<AppInstance>,
    pub status: parking_lot::Mutex<ProcessStatus>,
    pub child: AsyncMutex<Option<Child>>,
}

impl ManagedProcess {
    pub fn new(instance: AppInstance) -> Self {
        Self {
            instance: parking_lot::Mutex::new(instance),
            status: parking_lot::Mutex::new(ProcessStatus::new()),
            child: AsyncMutex::new(None),
        }
    }

    pub fn state(&self) -> ProcessState {
        self.status.lock().state
    }
}

/// Applies the §4.3 health transition table given the current state and
/// a probe outcome, returning the next state plus the status fields that
/// should be updated alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    /// No state change (e.g. probe ran against a state the health loop
    /// does not touch).
    Unchanged,
    BecameRunning,
    BecameUnhealthy,
    BecameFailed,
}

/// Decide the next health transition for an entry currently in `state`
/// with `unhealthy_since` (zero/`None` if healthy), given a probe
/// `outcome`, `now`, and the failure-window threshold
/// `consecutive_failures * health_interval`.
pub fn decide_health_transition(
    state: ProcessState,
    unhealthy_since: Option<DateTime<Utc>>,
    outcome: ProbeOutcome,
    now: DateTime<Utc>,
    unhealthy_failure_window: chrono::Duration,
) -> HealthTransition {
    use HealthTransition::*;
    use ProcessState::*;

    match (state, outcome) {
        (Starting, ProbeOutcome::Healthy) => BecameRunning,
        (Starting, _) => BecameUnhealthy,

        (Running, ProbeOutcome::Healthy) => Unchanged,
        (Running, _) => BecameUnhealthy,

        (Unhealthy, ProbeOutcome::Healthy) => BecameRunning,
        (Unhealthy, _) => {
            let since = unhealthy_since.unwrap_or(now);
            if now - since >= unhealthy_failure_window {
                BecameFailed
            } else {
                Unchanged
            }
        }

        _ => Unchanged,
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
