// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable event store: append-only rows keyed by a strictly
//! increasing sequence number, deduplicated by `client_id`, with a
//! per-type "latest sequence" index for poll-since-last-seen clients.

use crate::checkpoint::{CheckpointError, Checkpointer};
use crate::snapshot::{MaterializedState, Snapshot};
use crate::wal::{Wal, WalError};
use chrono::{DateTime, Utc};
use nexushub_core::{Event, PublishOutcome};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Append-only event store backed by a WAL, with an optional background
/// checkpointer for periodic snapshot + truncate.
pub struct EventStore {
    wal: Wal,
    events: BTreeMap<u64, Event>,
    state: MaterializedState,
    checkpointer: Option<Checkpointer>,
    snapshot_seq: u64,
}

impl EventStore {
    /// Open the store at `wal_path`, recovering from `snapshot_path` (if
    /// present) and replaying any WAL entries written after the
    /// snapshot's sequence.
    pub fn open(wal_path: &Path, snapshot_path: &Path) -> Result<Self, StoreError> {
        let wal = Wal::open(wal_path)?;

        let snapshot = Snapshot::read_from(snapshot_path)
            .map_err(CheckpointError::from)?
            .unwrap_or_else(|| Snapshot::new(0, MaterializedState::default()));

        let mut events = BTreeMap::new();
        let mut state = snapshot.state.clone();

        for event in wal.replay_all()? {
            if event.sequence > snapshot.seq {
                state.dedup_index.insert(event.client_id.clone(), event.sequence);
                state
                    .type_index
                    .entry(event.event_type.clone())
                    .and_modify(|v| *v = (*v).max(event.sequence))
                    .or_insert(event.sequence);
            }
            events.insert(event.sequence, event);
        }

        Ok(Self {
            wal,
            events,
            state,
            checkpointer: None,
            snapshot_seq: snapshot.seq,
        })
    }

    /// Attach a background checkpointer that writes to `snapshot_path`.
    pub fn with_checkpointer(mut self, snapshot_path: PathBuf) -> Result<Self, StoreError> {
        self.checkpointer = Some(Checkpointer::spawn(snapshot_path)?);
        Ok(self)
    }

    /// Insert an event, deduplicating on `client_id`. A repeat `client_id`
    /// returns the sequence number of the original insert without writing
    /// anything new.
    pub fn insert(
        &mut self,
        client_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        received_at: DateTime<Utc>,
    ) -> Result<PublishOutcome, StoreError> {
        let client_id = client_id.into();
        let event_type = event_type.into();

        if let Some(&existing) = self.state.dedup_index.get(&client_id) {
            return Ok(PublishOutcome::Duplicate(existing));
        }

        let sequence = self.wal.next_seq();
        let event = Event {
            sequence,
            client_id: client_id.clone(),
            event_type: event_type.clone(),
            payload,
            received_at,
        };

        self.wal.append(&event)?;
        self.state.dedup_index.insert(client_id, sequence);
        self.state
            .type_index
            .entry(event_type)
            .and_modify(|v| *v = (*v).max(sequence))
            .or_insert(sequence);
        self.events.insert(sequence, event);

        Ok(PublishOutcome::Inserted(sequence))
    }

    /// Flush the WAL if a group-commit batch is pending or due.
    pub fn maybe_flush(&mut self) -> Result<(), StoreError> {
        if self.wal.needs_flush() {
            self.wal.flush()?;
        }
        Ok(())
    }

    /// Force an immediate flush regardless of batching thresholds.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.wal.flush().map_err(StoreError::from)
    }

    pub fn get(&self, sequence: u64) -> Option<&Event> {
        self.events.get(&sequence)
    }

    /// All events with `sequence > after`, in ascending order, optionally
    /// restricted to one event type. Used by poller clients.
    pub fn events_since(&self, after: u64, event_type: Option<&str>) -> Vec<&Event> {
        self.events
            .range((std::ops::Bound::Excluded(after), std::ops::Bound::Unbounded))
            .map(|(_, e)| e)
            .filter(|e| event_type.map_or(true, |t| e.event_type == t))
            .collect()
    }

    pub fn latest_sequence_by_type(&self, event_type: &str) -> Option<u64> {
        self.state.type_index.get(event_type).copied()
    }

    pub fn latest_sequence(&self) -> u64 {
        self.events.keys().next_back().copied().unwrap_or(0)
    }

    /// Request a background checkpoint, blocking until it completes, then
    /// truncate the WAL through the checkpointed sequence.
    pub fn checkpoint(&mut self) -> Result<(), StoreError> {
        let Some(checkpointer) = &self.checkpointer else {
            return Ok(());
        };

        self.flush()?;
        let seq = self.latest_sequence();
        if seq <= self.snapshot_seq {
            return Ok(());
        }

        let handle = checkpointer.request(seq, self.state.clone())?;
        handle.wait()?;
        self.wal.truncate_through(seq)?;
        self.snapshot_seq = seq;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
