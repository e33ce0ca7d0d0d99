// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared state handed to every route handler. Construction wires the
//! non-owning handles per §9's "Cyclic references" guidance: the gateway
//! never owns the supervisor's workers, only its lookup API.

use crate::access_token_cache::AccessTokenCache;
use crate::debug_surface::DebugSurface;
use nexushub_core::InstanceId;
use nexushub_supervisor::{ActiveTtlSource, DebugEphemeralSource, DesiredStateSource, ProcessSupervisor};
use nexushub_storage::EventStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct GatewayConfig {
    pub internal_secret: String,
    pub admin_instance_id: InstanceId,
    pub cold_start_timeout: Duration,
    pub fanout_timeout: Duration,
    pub package_store_dir: PathBuf,
    pub access_token_ttl: chrono::Duration,
    pub session_ttl: chrono::Duration,
}

/// The gateway's working set: a supervisor lookup handle, the event
/// store, the access-token cache, the debug-ephemeral registry, and an
/// HTTP client reused for fan-out and reverse-proxy calls.
#[derive(Clone)]
pub struct AppState {
    pub supervisor: ProcessSupervisor,
    pub desired_state: Arc<DesiredStateSource>,
    pub active_ttl: Arc<ActiveTtlSource>,
    pub debug_ephemeral: Arc<DebugEphemeralSource>,
    pub event_store: Arc<parking_lot::Mutex<EventStore>>,
    pub access_tokens: Arc<AccessTokenCache>,
    pub debug_surface: Arc<DebugSurface>,
    pub http: reqwest::Client,
    pub config: Arc<GatewayConfig>,
}
