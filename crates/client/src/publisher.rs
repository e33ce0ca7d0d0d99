// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event publisher (§4.8): enqueue-and-forget with a single FIFO drain
//! worker and per-event exponential backoff on transport/5xx failures.

use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

#[derive(Clone)]
pub struct PublisherConfig {
    pub gateway_base_url: String,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub request_timeout: Duration,
}

struct PendingEvent {
    client_id: String,
    event_type: String,
    payload: Value,
    attempts: u32,
}

enum Command {
    Publish(PendingEvent),
    Flush(oneshot::Sender<()>),
    Stop,
}

/// Handle to the background publisher worker. Cloning shares the same
/// queue; the worker stops once every handle is dropped or `stop()` is
/// called.
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::UnboundedSender<Command>,
}

impl EventPublisher {
    pub fn spawn(client: reqwest::Client, config: PublisherConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(client, config, rx));
        Self { tx }
    }

    /// Enqueue `(event_type, payload)` with a fresh random `client_id`,
    /// per §4.8's dedup key.
    pub fn publish(&self, event_type: impl Into<String>, payload: Value) {
        let event = PendingEvent {
            client_id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            payload,
            attempts: 0,
        };
        let _ = self.tx.send(Command::Publish(event));
    }

    /// Blocks until the queue drains or `timeout` elapses. Returns `true`
    /// if the queue drained.
    pub async fn flush(&self, timeout: Duration) -> bool {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_err() {
            return true;
        }
        tokio::time::timeout(timeout, done_rx).await.is_ok()
    }

    pub fn stop(&self) {
        let _ = self.tx.send(Command::Stop);
    }
}

fn backoff(initial: Duration, max: Duration, attempts: u32) -> Duration {
    if attempts == 0 {
        return Duration::ZERO;
    }
    let shift = attempts - 1;
    let scaled = if shift >= u32::BITS {
        max
    } else {
        initial.checked_mul(1 << shift).unwrap_or(max)
    };
    scaled.min(max)
}

enum SendOutcome {
    Discard,
    Retry,
}

async fn send_once(client: &reqwest::Client, config: &PublisherConfig, event: &PendingEvent) -> SendOutcome {
    let url = format!("{}/events/publish", config.gateway_base_url);
    let body = serde_json::json!({
        "clientId": event.client_id,
        "type": event.event_type,
        "timestamp": chrono::Utc::now(),
        "data": event.payload,
    });

    let result = client.post(&url).timeout(config.request_timeout).json(&body).send().await;

    match result {
        Ok(response) if response.status().is_success() => SendOutcome::Discard,
        Ok(response) if response.status().is_client_error() => {
            warn!(status = %response.status(), event_type = %event.event_type, "publish rejected, discarding");
            SendOutcome::Discard
        }
        Ok(response) => {
            warn!(status = %response.status(), event_type = %event.event_type, "publish failed, retrying");
            SendOutcome::Retry
        }
        Err(e) => {
            warn!(error = %e, event_type = %event.event_type, "publish transport error, retrying");
            SendOutcome::Retry
        }
    }
}

async fn run(client: reqwest::Client, config: PublisherConfig, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut queue: VecDeque<PendingEvent> = VecDeque::new();
    let mut flush_waiters: Vec<oneshot::Sender<()>> = Vec::new();

    loop {
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                Command::Publish(event) => queue.push_back(event),
                Command::Flush(done) => flush_waiters.push(done),
                Command::Stop => return,
            }
        }

        if queue.is_empty() {
            for waiter in flush_waiters.drain(..) {
                let _ = waiter.send(());
            }
            match rx.recv().await {
                Some(Command::Publish(event)) => queue.push_back(event),
                Some(Command::Flush(done)) => {
                    let _ = done.send(());
                }
                Some(Command::Stop) | None => return,
            }
            continue;
        }

        let Some(mut event) = queue.pop_front() else {
            continue;
        };
        match send_once(&client, &config, &event).await {
            SendOutcome::Discard => {}
            SendOutcome::Retry => {
                event.attempts += 1;
                let delay = backoff(config.initial_backoff, config.max_backoff, event.attempts);
                tokio::time::sleep(delay).await;
                queue.push_front(event);
            }
        }
    }
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;
