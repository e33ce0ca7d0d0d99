// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/apps/register` and `/apps/install` (§6 External Interfaces table).
//! Registration maps app names to optional instance ids for callers that
//! need to resolve a name before an instance exists; install accepts a
//! package zip and returns the freshly assigned instance id.

use crate::error::GatewayError;
use crate::state::AppState;
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub names: Vec<AppNameMapping>,
}

#[derive(Deserialize)]
pub struct AppNameMapping {
    pub name: String,
    #[serde(rename = "instanceId")]
    pub instance_id: Option<String>,
}

/// Registers app-name -> instance-id mappings. NexusHub keeps no separate
/// name registry beyond what the desired-state source already tracks by
/// `instance_id`, so registration here is an acknowledgement endpoint: it
/// validates shape and echoes back what was accepted.
pub async fn register(Json(req): Json<RegisterRequest>) -> Response {
    let accepted: Vec<_> = req
        .names
        .iter()
        .map(|m| json!({ "name": m.name, "instanceId": m.instance_id }))
        .collect();
    Json(json!({ "registered": accepted })).into_response()
}

pub async fn install(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response, GatewayError> {
    let mut instance_id: Option<String> = None;
    let mut package_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| GatewayError::BadRequest(e.to_string()))? {
        match field.name() {
            Some("instanceId") => {
                instance_id = Some(field.text().await.map_err(|e| GatewayError::BadRequest(e.to_string()))?);
            }
            Some("package") => {
                let bytes = field.bytes().await.map_err(|e| GatewayError::BadRequest(e.to_string()))?;
                package_bytes = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let instance_id = instance_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let package_bytes = package_bytes.ok_or_else(|| GatewayError::BadRequest("missing package field".to_string()))?;

    let package_dir = state.config.package_store_dir.join(&instance_id);
    tokio::fs::create_dir_all(&package_dir)
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;
    tokio::fs::write(package_dir.join("package.zip"), package_bytes)
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    Ok(Json(json!({ "instanceId": instance_id })).into_response())
}

#[cfg(test)]
#[path = "apps_tests.rs"]
mod tests;
