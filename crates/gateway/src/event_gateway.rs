// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event Gateway (§4.7): the HTTP surface over the Event Store —
//! publish with best-effort fan-out, and poll-since-last-seen.

use crate::error::GatewayError;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::warn;

#[derive(Deserialize)]
pub struct PublishRequest {
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[allow(dead_code)]
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
    pub data: Value,
}

pub async fn publish(
    State(state): State<AppState>,
    Json(req): Json<PublishRequest>,
) -> Result<Response, GatewayError> {
    let outcome = {
        let mut store = state.event_store.lock();
        store
            .insert(req.client_id, req.event_type.clone(), req.data.clone(), chrono::Utc::now())
            .map_err(|e| GatewayError::Internal(e.to_string()))?
    };

    if !outcome.is_duplicate() {
        fan_out(&state, &req.event_type, outcome.sequence(), &req.data).await;
    }

    Ok(Json(json!({ "sequence": outcome.sequence() })).into_response())
}

/// Best-effort HTTP POST of `{type, sequence, payload}` to every running
/// instance subscribed to `event_type`. Failures are logged, never
/// propagated — publish must succeed regardless of fan-out outcome.
async fn fan_out(state: &AppState, event_type: &str, sequence: u64, payload: &Value) {
    let subscribers: Vec<String> = state
        .desired_state
        .list()
        .into_iter()
        .filter(|i| i.subscriptions.contains(event_type))
        .map(|i| i.instance_id.as_str().to_string())
        .collect();

    let body = json!({ "type": event_type, "sequence": sequence, "payload": payload });

    for instance_id in subscribers {
        let Ok((_, port)) = state.supervisor.get_by_id(&instance_id) else {
            continue;
        };
        let client = state.http.clone();
        let body = body.clone();
        let timeout = state.config.fanout_timeout;
        let instance_id = instance_id.clone();
        tokio::spawn(async move {
            let result = client
                .post(format!("http://127.0.0.1:{port}/events/notify"))
                .timeout(timeout)
                .json(&body)
                .send()
                .await;
            if let Err(e) = result {
                warn!(instance_id = %instance_id, error = %e, "event fan-out failed");
            }
        });
    }
}

pub async fn poll(
    State(state): State<AppState>,
    Json(req): Json<HashMap<String, u64>>,
) -> Result<Response, GatewayError> {
    let desired = state.desired_state.list();
    let store = state.event_store.lock();

    let mut advanced = HashMap::new();
    for (instance_id, last_seen) in req {
        let Some(instance) = desired.iter().find(|i| i.instance_id.as_str() == instance_id) else {
            continue;
        };
        let current = instance
            .subscriptions
            .iter()
            .filter_map(|t| store.latest_sequence_by_type(t))
            .max()
            .unwrap_or(0);

        if current > last_seen {
            advanced.insert(instance_id, current);
        }
    }

    if advanced.is_empty() {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }
    Ok(Json(advanced).into_response())
}

#[cfg(test)]
#[path = "event_gateway_tests.rs"]
mod tests;
