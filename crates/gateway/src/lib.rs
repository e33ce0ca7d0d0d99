// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! nexushub-gateway: the Routing Gateway (§4.5), Login Proxy and
//! Access-Token Cache (§4.6), Event Gateway (§4.7), and Debug Surface
//! (§4.9) — all behind one TLS-terminating `axum` listener.

pub mod access_token_cache;
pub mod apps;
pub mod auth;
pub mod debug_routes;
pub mod debug_surface;
pub mod error;
pub mod event_gateway;
pub mod login_proxy;
pub mod proxy;
pub mod routing;
pub mod state;
pub mod tls;

#[cfg(test)]
mod test_support;

pub use access_token_cache::AccessTokenCache;
pub use debug_surface::{DebugId, DebugStatus, DebugSurface};
pub use error::{GatewayError, TlsConfigError};
pub use routing::build_router;
pub use state::{AppState, GatewayConfig};

use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;

/// Serve the gateway's router over TLS at `addr` until the process is
/// signaled to stop. The caller owns cancellation via the handle it
/// passes to `axum_server`; NexusHub's daemon wires this to the same
/// root shutdown signal the supervisor observes (§5).
pub async fn serve(addr: SocketAddr, tls: RustlsConfig, state: AppState) -> std::io::Result<()> {
    let app = build_router(state);
    axum_server::bind_rustls(addr, tls).serve(app.into_make_service()).await
}
