// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for port allocation, health probing, and the supervisor's
//! lookup API.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("no free port in range {min}-{max}")]
    NoPortsAvailable { min: u16, max: u16 },
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("instance {0} is not known")]
    NotFound(String),
    #[error("instance {id} is in state {state}, not Running")]
    NotRunning { id: String, state: String },
    #[error("cold-start wait for {0} timed out")]
    ColdStartTimeout(String),
}

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error(transparent)]
    Port(#[from] PortError),
    #[error("failed to start child process: {0}")]
    Start(#[from] std::io::Error),
}
