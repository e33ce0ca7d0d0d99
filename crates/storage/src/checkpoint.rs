// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background checkpointing: periodically materialize the event store's
//! indices into a [`Snapshot`] and truncate the WAL, on a dedicated OS
//! thread so the checkpoint's fsync work never blocks the async runtime.

use crate::snapshot::{MaterializedState, Snapshot, SnapshotError};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("checkpoint worker thread is gone")]
    WorkerGone,
    #[error("failed to spawn checkpoint thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

/// A request to materialize the event store at a point in time.
struct CheckpointRequest {
    seq: u64,
    state: MaterializedState,
    reply: mpsc::Sender<Result<(), CheckpointError>>,
}

/// A handle returned by [`Checkpointer::request`]; await it to learn
/// whether the snapshot write succeeded.
pub struct CheckpointHandle {
    reply_rx: mpsc::Receiver<Result<(), CheckpointError>>,
}

impl CheckpointHandle {
    /// Block the calling thread until the checkpoint completes.
    pub fn wait(self) -> Result<(), CheckpointError> {
        self.reply_rx.recv().map_err(|_| CheckpointError::WorkerGone)?
    }
}

/// Runs a background thread that writes snapshots without blocking
/// callers on disk I/O. Clone and share the handle; drop the last clone
/// to stop the worker thread.
#[derive(Clone)]
pub struct Checkpointer {
    tx: mpsc::Sender<CheckpointRequest>,
}

impl Checkpointer {
    /// Spawn the background worker thread that writes snapshots to
    /// `snapshot_path`.
    pub fn spawn(snapshot_path: PathBuf) -> Result<Self, CheckpointError> {
        let (tx, rx) = mpsc::channel::<CheckpointRequest>();

        thread::Builder::new()
            .name("nexushub-checkpoint".to_string())
            .spawn(move || {
                for request in rx {
                    let snapshot = Snapshot::new(request.seq, request.state);
                    let result = snapshot
                        .write_to(&snapshot_path)
                        .map_err(CheckpointError::from);

                    match &result {
                        Ok(()) => info!(seq = request.seq, "checkpoint written"),
                        Err(e) => error!(error = %e, "checkpoint failed"),
                    }

                    let _ = request.reply.send(result);
                }
            })?;

        Ok(Self { tx })
    }

    /// Request a checkpoint of the given state at `seq`. Returns
    /// immediately with a handle the caller can wait on.
    pub fn request(&self, seq: u64, state: MaterializedState) -> Result<CheckpointHandle, CheckpointError> {
        let (reply, reply_rx) = mpsc::channel();
        self.tx
            .send(CheckpointRequest { seq, state, reply })
            .map_err(|_| CheckpointError::WorkerGone)?;
        Ok(CheckpointHandle { reply_rx })
    }
}

/// Load the most recent snapshot from disk, if any, for startup recovery.
pub fn load_snapshot(path: &std::path::Path) -> Result<Option<Snapshot>, CheckpointError> {
    Snapshot::read_from(path).map_err(CheckpointError::from)
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
