// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access-token bookkeeping shared between the login proxy and the
//! gateway's bearer-auth check.

use chrono::{DateTime, Utc};

/// One entry in the Access-Token Cache.
///
/// Entries with `expires_at < now` are treated as absent and evicted on
/// access — the cache never returns a token past its expiry.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            issued_at,
            expires_at,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn token_is_valid_before_expiry() {
        let now = Utc::now();
        let token = AccessToken::new("abc", now, now + Duration::seconds(60));
        assert!(token.is_valid_at(now));
        assert!(token.is_valid_at(now + Duration::seconds(59)));
    }

    #[test]
    fn token_is_invalid_after_expiry() {
        let now = Utc::now();
        let token = AccessToken::new("abc", now, now + Duration::seconds(60));
        assert!(!token.is_valid_at(now + Duration::seconds(61)));
    }
}
