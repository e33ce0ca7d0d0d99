// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event poller (§4.8): a single worker posts `/events/poll` on an
//! interval and fans advanced sequences out to per-instance subscriber
//! channels. Subscribers treat notifications as hints — sends are
//! non-blocking and drop on a full buffer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Clone)]
pub struct PollerConfig {
    pub gateway_base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub subscriber_capacity: usize,
}

struct SharedState {
    last_seen: parking_lot::Mutex<HashMap<String, u64>>,
    subscribers: parking_lot::Mutex<HashMap<String, Vec<mpsc::Sender<u64>>>>,
}

/// Handle to the background poller worker and its subscriber registry.
#[derive(Clone)]
pub struct EventPoller {
    shared: Arc<SharedState>,
    stop_tx: mpsc::UnboundedSender<()>,
    subscriber_capacity: usize,
}

impl EventPoller {
    pub fn spawn(client: reqwest::Client, config: PollerConfig) -> Self {
        let shared = Arc::new(SharedState {
            last_seen: parking_lot::Mutex::new(HashMap::new()),
            subscribers: parking_lot::Mutex::new(HashMap::new()),
        });
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        let subscriber_capacity = config.subscriber_capacity;

        tokio::spawn(run(client, config, shared.clone(), stop_rx));

        Self {
            shared,
            stop_tx,
            subscriber_capacity,
        }
    }

    /// Subscribe to sequence advances for `instance_id`, registering it in
    /// the tracked map at `0` if not already tracked.
    pub fn subscribe(&self, instance_id: impl Into<String>) -> mpsc::Receiver<u64> {
        let instance_id = instance_id.into();
        self.shared.last_seen.lock().entry(instance_id.clone()).or_insert(0);

        let (tx, rx) = mpsc::channel(self.subscriber_capacity);
        self.shared.subscribers.lock().entry(instance_id).or_default().push(tx);
        rx
    }

    pub fn stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

async fn run(client: reqwest::Client, config: PollerConfig, shared: Arc<SharedState>, mut stop_rx: mpsc::UnboundedReceiver<()>) {
    let mut ticker = tokio::time::interval(config.poll_interval);
    loop {
        tokio::select! {
            _ = stop_rx.recv() => return,
            _ = ticker.tick() => poll_once(&client, &config, &shared).await,
        }
    }
}

async fn poll_once(client: &reqwest::Client, config: &PollerConfig, shared: &SharedState) {
    let body: HashMap<String, u64> = shared.last_seen.lock().clone();
    if body.is_empty() {
        return;
    }

    let url = format!("{}/events/poll", config.gateway_base_url);
    let response = match client.post(&url).timeout(config.request_timeout).json(&body).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "poll request failed");
            return;
        }
    };

    if response.status() == reqwest::StatusCode::NOT_MODIFIED {
        return;
    }
    if !response.status().is_success() {
        warn!(status = %response.status(), "poll request rejected");
        return;
    }

    let advances: HashMap<String, u64> = match response.json().await {
        Ok(advances) => advances,
        Err(e) => {
            warn!(error = %e, "poll response decode failed");
            return;
        }
    };

    let mut last_seen = shared.last_seen.lock();
    for (instance_id, sequence) in &advances {
        last_seen.insert(instance_id.clone(), *sequence);
    }
    drop(last_seen);

    let subscribers = shared.subscribers.lock();
    for (instance_id, sequence) in advances {
        if let Some(senders) = subscribers.get(&instance_id) {
            for sender in senders {
                let _ = sender.try_send(sequence);
            }
        }
    }
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
