// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL write-ahead log for the event store, with group commit support.
//!
//! Publishes are durable before a caller is told they succeeded, enabling
//! crash recovery via snapshot + replay. Group commit batches writes
//! (~10ms) for throughput. Each entry is a single line of JSON:
//! `{"seq":N,"client_id":"...","type":"...","payload":...,"received_at":"..."}\n`

use nexushub_core::Event;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

/// Flush interval for group commit (~10ms batches).
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Maximum entries to buffer before forcing a flush.
pub const FLUSH_THRESHOLD: usize = 100;

/// Errors from WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSONL WAL for durable event storage with group commit.
///
/// Events are buffered in memory and flushed to disk either when
/// [`Wal::needs_flush`] returns true (interval elapsed or buffer full) or
/// explicitly via [`Wal::flush`].
pub struct Wal {
    file: File,
    path: PathBuf,
    write_seq: u64,
    write_buffer: Vec<Vec<u8>>,
    last_flush: Instant,
}

impl Wal {
    /// Open or create a WAL at the given path, scanning it to recover the
    /// next sequence number.
    pub fn open(path: &Path) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let write_seq = Self::scan_max_seq(&file)?;

        Ok(Self {
            file,
            path: path.to_owned(),
            write_seq,
            write_buffer: Vec::new(),
            last_flush: Instant::now(),
        })
    }

    /// Scan the WAL to find the maximum sequence number written so far,
    /// stopping at the first corrupt line (the event store's snapshot is
    /// the source of truth for anything beyond that point).
    fn scan_max_seq(file: &File) -> Result<u64, WalError> {
        let mut reader = BufReader::new(file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut max_seq = 0u64;
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<Event>(trimmed) {
                Ok(event) => max_seq = max_seq.max(event.sequence),
                Err(e) => {
                    warn!(error = %e, "corrupt WAL entry, stopping scan");
                    break;
                }
            }
        }

        Ok(max_seq)
    }

    /// Append an event to the write buffer and assign its sequence number.
    /// The event is not durable until [`Wal::flush`] is called.
    pub fn append(&mut self, event: &Event) -> Result<(), WalError> {
        let json_bytes = serde_json::to_vec(event)?;
        self.write_buffer.push(json_bytes);
        self.write_seq = self.write_seq.max(event.sequence);
        Ok(())
    }

    /// Next sequence number that would be assigned to a fresh insert.
    pub fn next_seq(&self) -> u64 {
        self.write_seq + 1
    }

    /// Whether a flush is due (interval elapsed or buffer full).
    pub fn needs_flush(&self) -> bool {
        !self.write_buffer.is_empty()
            && (self.last_flush.elapsed() >= FLUSH_INTERVAL
                || self.write_buffer.len() >= FLUSH_THRESHOLD)
    }

    /// Flush all buffered entries to disk with a single fsync.
    pub fn flush(&mut self) -> Result<(), WalError> {
        if self.write_buffer.is_empty() {
            return Ok(());
        }

        for mut json_bytes in self.write_buffer.drain(..) {
            json_bytes.push(b'\n');
            self.file.write_all(&json_bytes)?;
        }

        self.file.sync_all()?;
        self.last_flush = Instant::now();
        Ok(())
    }

    /// Replay every durable entry from the start of the file (used at
    /// startup to rebuild indices after loading a snapshot baseline).
    pub fn replay_all(&self) -> Result<Vec<Event>, WalError> {
        let mut reader = BufReader::new(self.file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut events = Vec::new();
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<Event>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!(error = %e, "corrupt WAL entry during replay, stopping");
                    break;
                }
            }
        }

        Ok(events)
    }

    /// Truncate entries with `sequence <= seq`, called after a checkpoint
    /// has made a snapshot covering those entries durable.
    pub fn truncate_through(&mut self, seq: u64) -> Result<(), WalError> {
        self.flush()?;

        let tmp_path = self.path.with_extension("tmp");
        let events = self.replay_all()?;

        {
            let mut tmp_file = File::create(&tmp_path)?;
            for event in events.iter().filter(|e| e.sequence > seq) {
                let mut bytes = serde_json::to_vec(event)?;
                bytes.push(b'\n');
                tmp_file.write_all(&bytes)?;
            }
            tmp_file.sync_all()?;
        }

        std::fs::rename(&tmp_path, &self.path)?;
        self.file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        Ok(())
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
