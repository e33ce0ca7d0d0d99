// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway-wide error types, mapped to HTTP responses at the edge.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("instance not found: {0}")]
    NotFound(String),
    #[error("instance failed to become ready: {0}")]
    ColdStartTimeout(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::ColdStartTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, axum::Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TlsConfigError {
    #[error("failed to read certificate file {path}: {source}")]
    ReadCert { path: String, source: std::io::Error },
    #[error("failed to read private key file {path}: {source}")]
    ReadKey { path: String, source: std::io::Error },
    #[error("no private key found in {0}")]
    NoKey(String),
    #[error("rustls configuration rejected the certificate chain: {0}")]
    Rustls(String),
}
