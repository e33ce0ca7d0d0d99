// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Debug Surface (§4.9): ephemeral development instances — create,
//! chunked upload, install, status, and a live log tail — backed by the
//! supervisor's `DebugEphemeralSource`.

use chrono::{DateTime, Utc};
use nexushub_core::{AppInstance, ProcessState};
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use tokio::sync::broadcast;

nexushub_core::define_id! {
    /// Opaque identifier for one debug-application record.
    pub struct DebugId;
}

const LOG_BUFFER_CAPACITY: usize = 200;
const LOG_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugStatus {
    Pending,
    Starting,
    Running,
    Unhealthy,
    Failed,
    Stopped,
}

impl From<ProcessState> for DebugStatus {
    fn from(state: ProcessState) -> Self {
        match state {
            ProcessState::Starting => DebugStatus::Starting,
            ProcessState::Running => DebugStatus::Running,
            ProcessState::Unhealthy => DebugStatus::Unhealthy,
            ProcessState::Failed => DebugStatus::Failed,
            ProcessState::Stopping | ProcessState::Stopped => DebugStatus::Stopped,
        }
    }
}

pub struct DebugRecord {
    pub id: DebugId,
    pub app_id: String,
    pub display_name: String,
    pub host_name: Option<String>,
    pub db_name: String,
    pub static_service_url: Option<String>,
    pub status: DebugStatus,
    pub port: Option<u16>,
    pub process_id: Option<u32>,
    pub health_check: Option<String>,
    pub uploaded_path: Option<PathBuf>,
    pub last_updated: DateTime<Utc>,
}

struct UploadAssembly {
    total_chunks: u32,
    expected_hash: String,
    chunks: HashMap<u32, Vec<u8>>,
    completed: bool,
    assembled_path: Option<PathBuf>,
}

#[derive(Serialize)]
pub struct UploadStatus {
    pub received: u32,
    pub total: u32,
    pub percent: f32,
    pub completed: bool,
    #[serde(rename = "fileHash")]
    pub file_hash: String,
}

struct LogHub {
    buffer: VecDeque<String>,
    tx: broadcast::Sender<String>,
}

impl LogHub {
    fn new() -> Self {
        let (tx, _rx) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        Self {
            buffer: VecDeque::with_capacity(LOG_BUFFER_CAPACITY),
            tx,
        }
    }
}

/// In-memory registry of debug records, chunked uploads, and per-instance
/// log hubs. Spawning is delegated to the supervisor via the
/// `DebugEphemeralSource` handle passed at construction.
pub struct DebugSurface {
    records: Mutex<HashMap<String, DebugRecord>>,
    uploads: Mutex<HashMap<String, UploadAssembly>>,
    logs: Mutex<HashMap<String, LogHub>>,
    package_store_dir: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum DebugSurfaceError {
    #[error("debug record {0} not found")]
    NotFound(String),
    #[error("upload for {0} is not complete")]
    UploadIncomplete(String),
    #[error("chunk index {index} out of range for {total} total chunks")]
    ChunkOutOfRange { index: u32, total: u32 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DebugSurface {
    pub fn new(package_store_dir: PathBuf) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            uploads: Mutex::new(HashMap::new()),
            logs: Mutex::new(HashMap::new()),
            package_store_dir,
        }
    }

    /// Create a new record, generating its id. If a prior record shares
    /// `app_id`, the caller is responsible for stopping and removing it
    /// first (the supervisor side effect lives in the route handler,
    /// which also owns the `DebugEphemeralSource` handle).
    pub fn create(
        &self,
        app_id: String,
        display_name: String,
        host_name: Option<String>,
        db_name: String,
        static_service_url: Option<String>,
        now: DateTime<Utc>,
    ) -> DebugId {
        let id = DebugId::new(uuid::Uuid::new_v4().to_string());
        let record = DebugRecord {
            id: id.clone(),
            app_id,
            display_name,
            host_name,
            db_name,
            static_service_url,
            status: DebugStatus::Pending,
            port: None,
            process_id: None,
            health_check: None,
            uploaded_path: None,
            last_updated: now,
        };
        self.records.lock().insert(id.as_str().to_string(), record);
        id
    }

    /// The existing record id for `app_id`, if any (used to evict a prior
    /// debug instance of the same app before creating a new one).
    pub fn find_by_app_id(&self, app_id: &str) -> Option<String> {
        self.records
            .lock()
            .values()
            .find(|r| r.app_id == app_id)
            .map(|r| r.id.as_str().to_string())
    }

    pub fn remove(&self, id: &str) -> Option<DebugRecord> {
        self.uploads.lock().remove(id);
        self.logs.lock().remove(id);
        self.records.lock().remove(id)
    }

    pub fn get_status(&self, id: &str, now: DateTime<Utc>) -> Option<(DebugStatus, Option<u16>, Option<u32>, Option<String>, DateTime<Utc>)> {
        let mut records = self.records.lock();
        let record = records.get_mut(id)?;
        record.last_updated = now;
        Some((record.status, record.port, record.process_id, record.health_check.clone(), record.last_updated))
    }

    pub fn apply_process_state(&self, id: &str, state: ProcessState, port: Option<u16>, pid: Option<u32>) {
        if let Some(record) = self.records.lock().get_mut(id) {
            record.status = DebugStatus::from(state);
            record.port = port;
            record.process_id = pid;
        }
    }

    pub fn package_path(&self, id: &str) -> PathBuf {
        self.package_store_dir.join(id)
    }

    /// Accumulate one chunk; once all chunks are present, assemble, hash,
    /// and compare against `expected_hash`, writing the result to the
    /// package store on match.
    pub fn accept_chunk(
        &self,
        id: &str,
        chunk_index: u32,
        total_chunks: u32,
        expected_hash: String,
        chunk: Vec<u8>,
    ) -> Result<UploadStatus, DebugSurfaceError> {
        if chunk_index >= total_chunks {
            return Err(DebugSurfaceError::ChunkOutOfRange {
                index: chunk_index,
                total: total_chunks,
            });
        }

        let assembled_bytes = {
            let mut uploads = self.uploads.lock();
            let assembly = uploads.entry(id.to_string()).or_insert_with(|| UploadAssembly {
                total_chunks,
                expected_hash: expected_hash.clone(),
                chunks: HashMap::new(),
                completed: false,
                assembled_path: None,
            });
            assembly.chunks.insert(chunk_index, chunk);

            if assembly.completed || (assembly.chunks.len() as u32) < assembly.total_chunks {
                None
            } else {
                let mut bytes = Vec::with_capacity(assembly.chunks.values().map(Vec::len).sum());
                for i in 0..assembly.total_chunks {
                    match assembly.chunks.get(&i) {
                        Some(part) => bytes.extend_from_slice(part),
                        None => break,
                    }
                }

                let mut hasher = Sha256::new();
                hasher.update(&bytes);
                let actual_hash = format!("{:x}", hasher.finalize());

                if actual_hash != assembly.expected_hash {
                    assembly.chunks.clear();
                    None
                } else {
                    assembly.completed = true;
                    Some(bytes)
                }
            }
        };

        if let Some(bytes) = assembled_bytes {
            std::fs::create_dir_all(&self.package_store_dir)?;
            let path = self.package_path(id).with_extension("zip");
            std::fs::write(&path, bytes)?;
            if let Some(assembly) = self.uploads.lock().get_mut(id) {
                assembly.assembled_path = Some(path.clone());
            }
            if let Some(record) = self.records.lock().get_mut(id) {
                record.uploaded_path = Some(path);
            }
        }

        self.upload_status(id).ok_or_else(|| DebugSurfaceError::NotFound(id.to_string()))
    }

    pub fn upload_status(&self, id: &str) -> Option<UploadStatus> {
        let uploads = self.uploads.lock();
        let assembly = uploads.get(id)?;
        let received = assembly.chunks.len() as u32;
        Some(UploadStatus {
            received,
            total: assembly.total_chunks,
            percent: (received as f32 / assembly.total_chunks.max(1) as f32) * 100.0,
            completed: assembly.completed,
            file_hash: assembly.expected_hash.clone(),
        })
    }

    pub fn assembled_path(&self, id: &str) -> Option<PathBuf> {
        self.uploads.lock().get(id)?.assembled_path.clone()
    }

    pub fn push_log(&self, id: &str, line: String) {
        let mut logs = self.logs.lock();
        let hub = logs.entry(id.to_string()).or_insert_with(LogHub::new);
        if hub.buffer.len() == LOG_BUFFER_CAPACITY {
            hub.buffer.pop_front();
        }
        hub.buffer.push_back(line.clone());
        let _ = hub.tx.send(line);
    }

    /// Buffered recent lines plus a receiver for subsequent live lines.
    pub fn subscribe_logs(&self, id: &str) -> (Vec<String>, broadcast::Receiver<String>) {
        let mut logs = self.logs.lock();
        let hub = logs.entry(id.to_string()).or_insert_with(LogHub::new);
        (hub.buffer.iter().cloned().collect(), hub.tx.subscribe())
    }

    /// Ids whose 1-hour inactivity timer (§4.9) has elapsed as of `now`.
    pub fn expired(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> Vec<String> {
        expired_app_instances(&self.records.lock(), now, timeout)
    }
}

/// The instances whose 1-hour inactivity timer has elapsed, for the
/// caller to stop, remove, and delete uploaded files for.
pub fn expired_app_instances(records: &HashMap<String, DebugRecord>, now: DateTime<Utc>, timeout: chrono::Duration) -> Vec<String> {
    records
        .iter()
        .filter(|(_, r)| now - r.last_updated >= timeout)
        .map(|(id, _)| id.clone())
        .collect()
}

impl DebugRecord {
    /// The desired-state descriptor for this record, once its package has
    /// been assembled at `package_path` (the debug surface's package
    /// store directory joined by this record's id).
    pub fn as_app_instance(&self, package_path: PathBuf) -> AppInstance {
        let mut instance = AppInstance::new(self.id.as_str(), package_path);
        instance.host_name = self.host_name.clone();
        instance
    }
}

#[cfg(test)]
#[path = "debug_surface_tests.rs"]
mod tests;
