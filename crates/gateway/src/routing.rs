// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Routing Gateway (§4.5): trace-id tagging, CORS, the fixed routes,
//! and the catch-all instance dispatch that reverse-proxies to a child
//! by its first path segment.

use crate::error::GatewayError;
use crate::state::AppState;
use crate::{apps, auth, debug_routes, event_gateway, login_proxy, proxy};
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::Router;
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};
use tracing::Instrument;

const TRACE_ID_HEADER: &str = "x-trace-id";

pub async fn trace_id(mut req: Request, next: Next) -> Response {
    let trace_id = uuid::Uuid::new_v4().to_string();
    let header_value = HeaderValue::from_str(&trace_id).unwrap_or_else(|_| HeaderValue::from_static("invalid-trace-id"));
    req.headers_mut().insert(TRACE_ID_HEADER, header_value.clone());

    let span = tracing::info_span!("request", trace_id = %trace_id, method = %req.method(), path = %req.uri().path());
    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(TRACE_ID_HEADER, header_value);
    response
}

/// `/<instance-id>/...` reverse proxy: resolves the instance (with
/// cold-start wait), bumps its activity TTL, strips the prefix, and
/// forwards the request.
async fn instance_dispatch(State(state): State<AppState>, req: Request) -> Result<Response, GatewayError> {
    let path = req.uri().path().to_string();
    let trimmed = path.trim_start_matches('/');
    let (instance_id, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));
    if instance_id.is_empty() {
        return Err(GatewayError::NotFound(path));
    }

    let (instance, port) = state
        .supervisor
        .get_by_id_with_wait(instance_id, state.config.cold_start_timeout)
        .await
        .map_err(|e| GatewayError::NotFound(e.to_string()))?;

    state.active_ttl.touch(instance, Utc::now());

    let forwarded_path = match req.uri().query() {
        Some(query) => format!("/{rest}?{query}"),
        None => format!("/{rest}"),
    };

    let method = req.method().clone();
    let headers = req.headers().clone();
    let body = axum::body::to_bytes(req.into_body(), usize::MAX)
        .await
        .map_err(|e| GatewayError::BadRequest(e.to_string()))?;

    proxy::forward(&state.http, port, method, &forwarded_path, headers, body.to_vec())
        .await
        .map_err(GatewayError::from)
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/public/login", post(login_proxy::login))
        .route("/public/logout", post(login_proxy::logout))
        .route("/public/access_token", post(login_proxy::access_token));

    let protected_routes = Router::new()
        .route("/apps/register", post(apps::register))
        .route("/apps/install", post(apps::install))
        .route("/events/publish", post(event_gateway::publish))
        .route("/events/poll", post(event_gateway::poll))
        .route("/debug/application", post(debug_routes::create))
        .route("/debug/application/:id", delete(debug_routes::delete))
        .route("/debug/application/:id/upload", post(debug_routes::upload))
        .route("/debug/application/:id/upload/status", get(debug_routes::upload_status))
        .route("/debug/application/:id/install-dev", post(debug_routes::install_dev))
        .route("/debug/application/:id/status", get(debug_routes::status))
        .route("/debug/application/:id/logs", get(debug_routes::logs))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer));

    let dispatch_routes = Router::new()
        .fallback(instance_dispatch)
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(dispatch_routes)
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
#[path = "routing_tests.rs"]
mod tests;
