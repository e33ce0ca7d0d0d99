// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Login Proxy and Access-Token exchange (§4.6). `/public/login` and
//! `/public/logout` are proxied verbatim to the admin instance;
//! `/public/access_token` additionally rotates the `YRT` refresh-token
//! cookie and populates the Access-Token Cache.
//!
//! The admin instance's internal access-token endpoint path is not named
//! in the source spec; this implementation fixes it at
//! [`ADMIN_ACCESS_TOKEN_PATH`] (see DESIGN.md's Open Question log).

use crate::error::GatewayError;
use crate::proxy;
use crate::state::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use nexushub_core::AccessToken;
use serde::Deserialize;
use serde_json::json;

pub const ADMIN_ACCESS_TOKEN_PATH: &str = "/internal/access_token";
const REFRESH_COOKIE: &str = "YRT";

async fn admin_port(state: &AppState) -> Result<u16, GatewayError> {
    state
        .supervisor
        .get_by_id_with_wait(state.config.admin_instance_id.as_str(), state.config.cold_start_timeout)
        .await
        .map(|(_, port)| port)
        .map_err(|e| GatewayError::NotFound(e.to_string()))
}

/// Strips the port from a `Host` header value, per the cookie domain rule
/// in §4.6 / §6 ("domain equal to the request host without port").
fn host_without_port(headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|h| h.split(':').next().unwrap_or(h).to_string())
        .unwrap_or_default()
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Response, GatewayError> {
    let port = admin_port(&state).await?;
    proxy::forward(&state.http, port, Method::POST, "/public/login", headers, body.to_vec())
        .await
        .map_err(GatewayError::from)
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Response, GatewayError> {
    let port = admin_port(&state).await?;
    proxy::forward(&state.http, port, Method::POST, "/public/logout", headers, body.to_vec())
        .await
        .map_err(GatewayError::from)
}

#[derive(Deserialize)]
struct AdminAccessTokenResponse {
    access_token: String,
    refresh_token: String,
    expiry: chrono::DateTime<chrono::Utc>,
}

pub async fn access_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, GatewayError> {
    let Some(refresh) = jar.get(REFRESH_COOKIE) else {
        return Ok(login_url_response(&headers));
    };

    let port = admin_port(&state).await?;
    let url = format!("http://127.0.0.1:{port}{ADMIN_ACCESS_TOKEN_PATH}");

    let upstream = state
        .http
        .post(&url)
        .header(axum::http::header::COOKIE, format!("{REFRESH_COOKIE}={}", refresh.value()))
        .send()
        .await?;

    if upstream.status() == reqwest::StatusCode::UNAUTHORIZED {
        return Ok(login_url_response(&headers));
    }
    if !upstream.status().is_success() {
        return Ok((StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY)).into_response());
    }

    let parsed: AdminAccessTokenResponse = upstream.json().await?;

    state.access_tokens.insert(AccessToken::new(
        parsed.access_token.clone(),
        chrono::Utc::now(),
        parsed.expiry,
    ));

    let domain = host_without_port(&headers);
    let cookie = Cookie::build((REFRESH_COOKIE, parsed.refresh_token))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .path("/")
        .domain(domain)
        .build();

    let jar = CookieJar::new().add(cookie);
    Ok((jar, axum::Json(json!({ "access_token": parsed.access_token }))).into_response())
}

fn login_url_response(headers: &HeaderMap) -> Response {
    let host = host_without_port(headers);
    axum::Json(json!({ "login_url": format!("{host}/") })).into_response()
}

#[cfg(test)]
#[path = "login_proxy_tests.rs"]
mod tests;
