// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! nexushub-storage: durable, crash-safe storage for the Event Bus.
//!
//! [`EventStore`] combines a JSONL [`wal::Wal`] with an atomically
//! written [`snapshot::Snapshot`] of the in-memory dedup and per-type
//! indices, checkpointed in the background by [`checkpoint::Checkpointer`]
//! so WAL growth stays bounded without blocking publishers.

pub mod checkpoint;
pub mod snapshot;
pub mod store;
pub mod wal;

pub use checkpoint::{CheckpointError, CheckpointHandle, Checkpointer};
pub use snapshot::{MaterializedState, Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use store::{EventStore, StoreError};
pub use wal::{Wal, WalError};
