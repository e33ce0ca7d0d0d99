// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event Bus domain types: the append-only, per-type sequence store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable row in the event store.
///
/// `sequence` is assigned on insert and strictly increases with insertion
/// order; two inserts sharing a `client_id` collapse to the first row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub sequence: u64,
    pub client_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

/// Result of attempting to insert an event.
///
/// `Duplicate` is not an error: the caller receives the sequence number of
/// the row that already exists for this `client_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Inserted(u64),
    Duplicate(u64),
}

impl PublishOutcome {
    pub fn sequence(self) -> u64 {
        match self {
            PublishOutcome::Inserted(seq) | PublishOutcome::Duplicate(seq) => seq,
        }
    }

    pub fn is_duplicate(self) -> bool {
        matches!(self, PublishOutcome::Duplicate(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_extracts_from_either_variant() {
        assert_eq!(PublishOutcome::Inserted(5).sequence(), 5);
        assert_eq!(PublishOutcome::Duplicate(5).sequence(), 5);
    }

    #[test]
    fn is_duplicate_distinguishes_variants() {
        assert!(!PublishOutcome::Inserted(1).is_duplicate());
        assert!(PublishOutcome::Duplicate(1).is_duplicate());
    }
}
