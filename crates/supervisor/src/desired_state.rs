// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Desired-State Source: a union of static, activity-TTL, and debug
//! ephemeral instance sets, composed at construction time behind a
//! single `list()` capability.

use chrono::{DateTime, Utc};
use nexushub_core::AppInstance;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// Default activity window bumped on each Gateway lookup.
pub const ACTIVE_TTL_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Inactivity timeout for debug-ephemeral instances.
pub const DEBUG_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// A sub-source contributing instances to the union.
pub trait InstanceSource: Send + Sync {
    fn list(&self) -> Vec<AppInstance>;
}

impl<T: InstanceSource + ?Sized> InstanceSource for std::sync::Arc<T> {
    fn list(&self) -> Vec<AppInstance> {
        (**self).list()
    }
}

/// Fixed list configured at startup (login/admin instances).
pub struct StaticSource {
    instances: Vec<AppInstance>,
}

impl StaticSource {
    pub fn new(instances: Vec<AppInstance>) -> Self {
        Self { instances }
    }
}

impl InstanceSource for StaticSource {
    fn list(&self) -> Vec<AppInstance> {
        self.instances.clone()
    }
}

struct ActiveEntry {
    instance: AppInstance,
    expires_at: DateTime<Utc>,
}

/// On-demand instances kept alive by a rolling activity TTL; a Gateway
/// lookup bumps the TTL, entries drop out of `list()` once expired.
#[derive(Default)]
pub struct ActiveTtlSource {
    entries: Mutex<HashMap<String, ActiveEntry>>,
}

impl ActiveTtlSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh an instance's TTL, extending it by
    /// [`ACTIVE_TTL_WINDOW`] from `now`.
    pub fn touch(&self, instance: AppInstance, now: DateTime<Utc>) {
        let expires_at = now + chrono::Duration::from_std(ACTIVE_TTL_WINDOW).unwrap_or_default();
        self.entries.lock().insert(
            instance.instance_id.as_str().to_string(),
            ActiveEntry { instance, expires_at },
        );
    }

    /// Remove an entry outright (used for explicit deactivation).
    pub fn remove(&self, instance_id: &str) {
        self.entries.lock().remove(instance_id);
    }
}

impl InstanceSource for ActiveTtlSource {
    fn list(&self) -> Vec<AppInstance> {
        let now = Utc::now();
        let entries = self.entries.lock();
        entries
            .values()
            .filter(|e| e.expires_at > now)
            .map(|e| e.instance.clone())
            .collect()
    }
}

struct DebugEntry {
    instance: AppInstance,
    last_activity: DateTime<Utc>,
}

/// Debug Surface-populated ephemeral instances; live until an explicit
/// delete or a fixed inactivity timer fires.
#[derive(Default)]
pub struct DebugEphemeralSource {
    entries: Mutex<HashMap<String, DebugEntry>>,
}

impl DebugEphemeralSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, instance: AppInstance, now: DateTime<Utc>) {
        self.entries.lock().insert(
            instance.instance_id.as_str().to_string(),
            DebugEntry {
                instance,
                last_activity: now,
            },
        );
    }

    /// Reset the inactivity timer for an instance (status check or log
    /// stream start).
    pub fn rearm(&self, instance_id: &str, now: DateTime<Utc>) {
        if let Some(entry) = self.entries.lock().get_mut(instance_id) {
            entry.last_activity = now;
        }
    }

    pub fn remove(&self, instance_id: &str) -> Option<AppInstance> {
        self.entries.lock().remove(instance_id).map(|e| e.instance)
    }

    /// Instances whose inactivity timer has elapsed as of `now`, for the
    /// caller to stop and remove.
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<AppInstance> {
        let timeout = chrono::Duration::from_std(DEBUG_INACTIVITY_TIMEOUT).unwrap_or_default();
        self.entries
            .lock()
            .values()
            .filter(|e| now - e.last_activity >= timeout)
            .map(|e| e.instance.clone())
            .collect()
    }
}

impl InstanceSource for DebugEphemeralSource {
    fn list(&self) -> Vec<AppInstance> {
        let now = Utc::now();
        let timeout = chrono::Duration::from_std(DEBUG_INACTIVITY_TIMEOUT).unwrap_or_default();
        self.entries
            .lock()
            .values()
            .filter(|e| now - e.last_activity < timeout)
            .map(|e| e.instance.clone())
            .collect()
    }
}

/// Composes the three concrete sub-sources behind a single `list()`.
pub struct DesiredStateSource {
    sources: Vec<Box<dyn InstanceSource>>,
}

impl DesiredStateSource {
    pub fn new(sources: Vec<Box<dyn InstanceSource>>) -> Self {
        Self { sources }
    }

    /// The current union of all sub-sources. Duplicate `instance_id`s
    /// across sub-sources keep the first occurrence — sub-source
    /// ordering therefore acts as a priority (static first).
    pub fn list(&self) -> Vec<AppInstance> {
        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();
        for source in &self.sources {
            for instance in source.list() {
                if seen.insert(instance.instance_id.as_str().to_string()) {
                    result.push(instance);
                }
            }
        }
        result
    }
}

#[cfg(test)]
#[path = "desired_state_tests.rs"]
mod tests;
