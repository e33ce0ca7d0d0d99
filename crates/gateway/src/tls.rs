// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TLS termination for the Routing Gateway's public listener. Certificate
//! *provisioning* is out of scope (operator-supplied paths only); this
//! module only loads and terminates with them.

use crate::error::TlsConfigError;
use axum_server::tls_rustls::RustlsConfig;
use std::path::Path;

/// Load a PEM certificate chain and private key from disk into an
/// `axum-server` rustls config, failing fast (fatal-at-startup, per §7)
/// if either file is missing or unparsable.
pub async fn load_rustls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, TlsConfigError> {
    let cert_bytes = std::fs::read(cert_path).map_err(|e| TlsConfigError::ReadCert {
        path: cert_path.display().to_string(),
        source: e,
    })?;
    let key_bytes = std::fs::read(key_path).map_err(|e| TlsConfigError::ReadKey {
        path: key_path.display().to_string(),
        source: e,
    })?;

    let certs: Vec<_> = rustls_pemfile::certs(&mut cert_bytes.as_slice())
        .collect::<Result<_, _>>()
        .map_err(|e| TlsConfigError::Rustls(e.to_string()))?;

    let key = rustls_pemfile::private_key(&mut key_bytes.as_slice())
        .map_err(|e| TlsConfigError::Rustls(e.to_string()))?
        .ok_or_else(|| TlsConfigError::NoKey(key_path.display().to_string()))?;

    RustlsConfig::from_der(
        certs.into_iter().map(|c| c.to_vec()).collect(),
        key.secret_der().to_vec(),
    )
    .await
    .map_err(|e| TlsConfigError::Rustls(e.to_string()))
}

#[cfg(test)]
#[path = "tls_tests.rs"]
mod tests;
