// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for `/debug/application*` (§4.9), wiring the
//! [`crate::debug_surface::DebugSurface`] record-keeping to the
//! supervisor's `DebugEphemeralSource` so reconciliation spawns what
//! `install-dev` installs.

use crate::debug_surface::DebugStatus;
use crate::error::GatewayError;
use crate::state::AppState;
use axum::extract::{Multipart, Path, State};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use futures::stream::{self, Stream};
use nexushub_core::ProcessState;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::StreamExt;

const INSTALL_DEV_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
pub struct CreateDebugRequest {
    #[serde(rename = "appId")]
    pub app_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "hostName")]
    pub host_name: Option<String>,
    #[serde(rename = "dbName")]
    pub db_name: String,
    #[serde(rename = "staticServiceUrl")]
    pub static_service_url: Option<String>,
}

pub async fn create(State(state): State<AppState>, Json(req): Json<CreateDebugRequest>) -> Response {
    if let Some(prior_id) = state.debug_surface.find_by_app_id(&req.app_id) {
        state.debug_ephemeral.remove(&prior_id);
        state.debug_surface.remove(&prior_id);
    }

    let id = state.debug_surface.create(
        req.app_id,
        req.display_name,
        req.host_name,
        req.db_name,
        req.static_service_url,
        Utc::now(),
    );

    Json(json!({ "id": id.as_str() })).into_response()
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    // Removing from the DebugEphemeralSource drops the instance from the
    // desired set; the reconciler stops it within one tick.
    state.debug_ephemeral.remove(&id);
    state.debug_surface.remove(&id);
    axum::http::StatusCode::NO_CONTENT.into_response()
}

pub async fn upload(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Response, GatewayError> {
    let mut chunk_index = None;
    let mut total_chunks = None;
    let mut file_hash = None;
    let mut chunk_bytes = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| GatewayError::BadRequest(e.to_string()))? {
        match field.name() {
            Some("chunkIndex") => {
                let text = field.text().await.map_err(|e| GatewayError::BadRequest(e.to_string()))?;
                chunk_index = text.parse::<u32>().ok();
            }
            Some("totalChunks") => {
                let text = field.text().await.map_err(|e| GatewayError::BadRequest(e.to_string()))?;
                total_chunks = text.parse::<u32>().ok();
            }
            Some("fileHash") => {
                file_hash = Some(field.text().await.map_err(|e| GatewayError::BadRequest(e.to_string()))?);
            }
            Some("chunk") => {
                chunk_bytes = Some(field.bytes().await.map_err(|e| GatewayError::BadRequest(e.to_string()))?.to_vec());
            }
            _ => {}
        }
    }

    let (Some(chunk_index), Some(total_chunks), Some(file_hash), Some(chunk_bytes)) =
        (chunk_index, total_chunks, file_hash, chunk_bytes)
    else {
        return Err(GatewayError::BadRequest("missing multipart field".to_string()));
    };

    let status = state
        .debug_surface
        .accept_chunk(&id, chunk_index, total_chunks, file_hash, chunk_bytes)
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    Ok(Json(status).into_response())
}

pub async fn upload_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.debug_surface.upload_status(&id) {
        Some(status) => Json(status).into_response(),
        None => axum::http::StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Serialize)]
struct InstallDevResponse {
    status: DebugStatus,
    partial: bool,
}

pub async fn install_dev(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, GatewayError> {
    let assembled = state
        .debug_surface
        .assembled_path(&id)
        .ok_or_else(|| GatewayError::BadRequest("no completed upload for this record".to_string()))?;

    let package_dir = state.debug_surface.package_path(&id);
    tokio::fs::create_dir_all(package_dir.join("app").join("bin"))
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;
    tokio::fs::copy(&assembled, package_dir.join("app").join("bin").join("app"))
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    let record_instance = {
        let status = state.debug_surface.get_status(&id, Utc::now());
        if status.is_none() {
            return Err(GatewayError::NotFound(id.clone()));
        }
        nexushub_core::AppInstance::new(id.as_str(), package_dir)
    };

    state.debug_ephemeral.insert(record_instance, Utc::now());

    let deadline = tokio::time::Instant::now() + INSTALL_DEV_TIMEOUT;
    loop {
        if let Ok((_, port)) = state.supervisor.get_by_id(&id) {
            state.debug_surface.apply_process_state(&id, ProcessState::Running, Some(port), None);
            return Ok(Json(InstallDevResponse {
                status: DebugStatus::Running,
                partial: false,
            })
            .into_response());
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(Json(InstallDevResponse {
                status: DebugStatus::Pending,
                partial: true,
            })
            .into_response());
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

#[derive(Serialize)]
struct DebugStatusResponse {
    status: DebugStatus,
    port: Option<u16>,
    #[serde(rename = "processId")]
    process_id: Option<u32>,
    #[serde(rename = "healthCheck")]
    health_check: Option<String>,
    #[serde(rename = "lastUpdated")]
    last_updated: chrono::DateTime<Utc>,
}

pub async fn status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    state.debug_ephemeral.rearm(&id, Utc::now());
    match state.debug_surface.get_status(&id, Utc::now()) {
        Some((status, port, process_id, health_check, last_updated)) => Json(DebugStatusResponse {
            status,
            port,
            process_id,
            health_check,
            last_updated,
        })
        .into_response(),
        None => axum::http::StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    state.debug_ephemeral.rearm(&id, Utc::now());
    let (buffered, rx) = state.debug_surface.subscribe_logs(&id);
    let live = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(|r| r.ok());
    let stream = stream::iter(buffered).chain(live).map(|line| Ok(SseEvent::default().data(line)));
    Sse::new(stream)
}

#[cfg(test)]
#[path = "debug_routes_tests.rs"]
mod tests;
