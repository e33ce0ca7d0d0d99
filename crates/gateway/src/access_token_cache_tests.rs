use super::*;
use chrono::Duration;

#[test]
fn unknown_token_is_invalid() {
    let cache = AccessTokenCache::new();
    assert!(!cache.validate("nope", Utc::now()));
}

#[test]
fn fresh_token_validates() {
    let cache = AccessTokenCache::new();
    let now = Utc::now();
    cache.insert(AccessToken::new("tok1", now, now + Duration::seconds(60)));
    assert!(cache.validate("tok1", now));
}

#[test]
fn expired_token_is_evicted_on_validate() {
    let cache = AccessTokenCache::new();
    let now = Utc::now();
    cache.insert(AccessToken::new("tok1", now, now + Duration::seconds(10)));

    assert!(!cache.validate("tok1", now + Duration::seconds(11)));
    assert!(!cache.validate("tok1", now));
}
