// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! nexushub-supervisor: the Process Supervisor (§4.1-4.4) — port
//! allocation, health probing, the desired-state union, and the
//! reconciler/health loops that keep `actualState` converged on it.

pub mod backoff;
pub mod desired_state;
pub mod error;
pub mod health;
pub mod port_allocator;
pub mod process;
pub mod supervisor;

pub use backoff::restart_delay;
pub use desired_state::{
    ActiveTtlSource, DebugEphemeralSource, DesiredStateSource, InstanceSource, StaticSource,
    ACTIVE_TTL_WINDOW, DEBUG_INACTIVITY_TIMEOUT,
};
pub use error::{LookupError, PortError, SpawnError};
pub use health::{HealthProber, Probe, ProbeOutcome};
pub use port_allocator::PortAllocator;
pub use process::{decide_health_transition, HealthTransition, ManagedProcess};
pub use supervisor::{ProcessSupervisor, SupervisorConfig};
