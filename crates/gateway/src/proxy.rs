// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared reverse-proxy plumbing: forward an inbound request's method,
//! headers, and body to `127.0.0.1:<port>`, rewriting `Host`, and convert
//! the upstream response back into an `axum::Response`.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};

/// Forward `method`/`path`/`headers`/`body` to the local child at `port`,
/// rewriting the outbound `Host` header to `127.0.0.1:<port>`.
pub async fn forward(
    client: &reqwest::Client,
    port: u16,
    method: Method,
    path: &str,
    mut headers: HeaderMap,
    body: Vec<u8>,
) -> Result<Response, reqwest::Error> {
    headers.remove(axum::http::header::HOST);
    if let Ok(host) = HeaderValue::from_str(&format!("127.0.0.1:{port}")) {
        headers.insert(axum::http::header::HOST, host);
    }

    let url = format!("http://127.0.0.1:{port}{path}");
    let reqwest_method = reqwest::Method::from_bytes(method.as_str().as_bytes()).unwrap_or(reqwest::Method::GET);

    let upstream = client
        .request(reqwest_method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await?;

    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let response_headers = upstream.headers().clone();
    let bytes = upstream.bytes().await?;

    let mut response = (status, Body::from(bytes)).into_response();
    *response.headers_mut() = response_headers;
    Ok(response)
}
