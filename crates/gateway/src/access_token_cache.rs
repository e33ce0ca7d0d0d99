// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access-Token Cache (§4.6): read-heavy, write-rare map from opaque
//! access token to its expiry, behind a single read-write lock per §5's
//! "Shared-resource policy".

use chrono::{DateTime, Utc};
use nexushub_core::AccessToken;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct AccessTokenCache {
    tokens: RwLock<HashMap<String, AccessToken>>,
}

impl AccessTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: AccessToken) {
        self.tokens.write().insert(token.token.clone(), token);
    }

    /// True iff `token` is present and unexpired as of `now`; an expired
    /// entry is evicted as a side effect of the check.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> bool {
        {
            let tokens = self.tokens.read();
            match tokens.get(token) {
                Some(entry) if entry.is_valid_at(now) => return true,
                Some(_) => {}
                None => return false,
            }
        }
        self.tokens.write().remove(token);
        false
    }
}

#[cfg(test)]
#[path = "access_token_cache_tests.rs"]
mod tests;
