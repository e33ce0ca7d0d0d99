use super::*;
use nexushub_core::AppInstance;

fn inst(id: &str) -> AppInstance {
    AppInstance::new(id, format!("/pkg/{id}"))
}

#[test]
fn static_source_returns_fixed_list() {
    let source = StaticSource::new(vec![inst("login"), inst("admin")]);
    let ids: Vec<_> = source.list().into_iter().map(|i| i.instance_id.as_str().to_string()).collect();
    assert_eq!(ids, vec!["login", "admin"]);
}

#[test]
fn active_ttl_source_drops_expired_entries() {
    let source = ActiveTtlSource::new();
    let now = Utc::now();
    source.touch(inst("a"), now - chrono::Duration::minutes(10));
    assert!(source.list().is_empty());
}

#[test]
fn active_ttl_source_keeps_fresh_entries() {
    let source = ActiveTtlSource::new();
    let now = Utc::now();
    source.touch(inst("a"), now);
    assert_eq!(source.list().len(), 1);
}

#[test]
fn active_ttl_touch_extends_window() {
    let source = ActiveTtlSource::new();
    let now = Utc::now();
    source.touch(inst("a"), now - chrono::Duration::minutes(4));
    assert_eq!(source.list().len(), 1);
}

#[test]
fn debug_source_rearm_prevents_expiry() {
    let source = DebugEphemeralSource::new();
    let now = Utc::now();
    source.insert(inst("dbg"), now - chrono::Duration::minutes(90));
    assert_eq!(source.expired(now).len(), 1);

    source.rearm("dbg", now);
    assert!(source.expired(now).is_empty());
}

#[test]
fn debug_source_list_excludes_expired_entries() {
    let source = DebugEphemeralSource::new();
    let now = Utc::now();
    source.insert(inst("stale"), now - chrono::Duration::minutes(90));
    source.insert(inst("fresh"), now);

    let ids: Vec<_> = source.list().into_iter().map(|i| i.instance_id.as_str().to_string()).collect();
    assert_eq!(ids, vec!["fresh"]);
}

#[test]
fn debug_source_remove_returns_instance() {
    let source = DebugEphemeralSource::new();
    let now = Utc::now();
    source.insert(inst("dbg"), now);
    let removed = source.remove("dbg").unwrap();
    assert_eq!(removed.instance_id.as_str(), "dbg");
    assert!(source.remove("dbg").is_none());
}

#[test]
fn composite_union_dedupes_by_first_occurrence() {
    let static_source = StaticSource::new(vec![inst("a")]);
    let debug_source = DebugEphemeralSource::new();
    debug_source.insert(inst("a"), Utc::now());
    debug_source.insert(inst("b"), Utc::now());

    let composite = DesiredStateSource::new(vec![Box::new(static_source), Box::new(debug_source)]);
    let ids: std::collections::HashSet<_> =
        composite.list().into_iter().map(|i| i.instance_id.as_str().to_string()).collect();

    assert_eq!(ids.len(), 2);
    assert!(ids.contains("a"));
    assert!(ids.contains("b"));
}
