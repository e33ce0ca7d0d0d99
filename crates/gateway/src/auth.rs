// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer-token authorization middleware (§4.5 point 4, §6 "Bearer token
//! formats"). Applied to every route except `/public/*` and OPTIONS
//! preflights, which are carved out in `routing.rs` — `/debug/*` routes
//! are protected by this middleware, not exempt from it.

use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

pub async fn require_bearer(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if req.method() == axum::http::Method::OPTIONS {
        return next.run(req).await;
    }

    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let authorized = token == state.config.internal_secret || state.access_tokens.validate(token, Utc::now());

    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    next.run(req).await
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
