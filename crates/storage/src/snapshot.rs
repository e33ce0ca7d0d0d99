// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-safe snapshot persistence for the event store's in-memory indices.
//!
//! A snapshot captures the dedup index (`client_id -> sequence`) and the
//! per-type latest-sequence index at a point in the WAL, so startup can
//! skip replaying everything from the beginning. Writes go through a
//! temp file, fsync, rename, fsync-parent-dir sequence so a crash never
//! leaves a half-written snapshot in place of a good one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Current on-disk snapshot format version.
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

/// Zstd compression level used for snapshot bodies.
pub const SNAPSHOT_COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("compression error: {0}")]
    Compression(io::Error),
    #[error("unsupported snapshot version {0}, expected {CURRENT_SNAPSHOT_VERSION}")]
    UnsupportedVersion(u32),
}

/// The materialized indices the event store needs to resume without a
/// full WAL replay.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MaterializedState {
    pub dedup_index: HashMap<String, u64>,
    pub type_index: HashMap<String, u64>,
}

/// A durable point-in-time capture of the event store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub version: u32,
    pub seq: u64,
    pub state: MaterializedState,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(seq: u64, state: MaterializedState) -> Self {
        Self {
            version: CURRENT_SNAPSHOT_VERSION,
            seq,
            state,
            created_at: Utc::now(),
        }
    }

    /// Write this snapshot atomically to `path` as zstd-compressed JSON.
    pub fn write_to(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = serde_json::to_vec(self)?;
        let compressed =
            zstd::encode_all(&json[..], SNAPSHOT_COMPRESSION_LEVEL).map_err(SnapshotError::Compression)?;

        let tmp_path = path.with_extension("tmp");
        {
            let mut tmp_file = File::create(&tmp_path)?;
            tmp_file.write_all(&compressed)?;
            tmp_file.sync_all()?;
        }

        std::fs::rename(&tmp_path, path)?;

        if let Some(parent) = path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }

    /// Load a snapshot previously written by [`Snapshot::write_to`].
    pub fn read_from(path: &Path) -> Result<Option<Self>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }

        let mut compressed = Vec::new();
        File::open(path)?.read_to_end(&mut compressed)?;

        let json = zstd::decode_all(&compressed[..]).map_err(SnapshotError::Compression)?;
        let snapshot: Snapshot = serde_json::from_slice(&json)?;

        if snapshot.version != CURRENT_SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }

        Ok(Some(snapshot))
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
