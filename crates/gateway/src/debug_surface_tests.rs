use super::*;
use tempfile::tempdir;

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[test]
fn create_then_find_by_app_id() {
    let dir = tempdir().unwrap();
    let surface = DebugSurface::new(dir.path().to_path_buf());
    let id = surface.create("acme".into(), "Acme Dev".into(), None, "acme.db".into(), None, Utc::now());

    assert_eq!(surface.find_by_app_id("acme"), Some(id.as_str().to_string()));
}

#[test]
fn upload_single_chunk_completes_on_hash_match() {
    let dir = tempdir().unwrap();
    let surface = DebugSurface::new(dir.path().to_path_buf());
    let id = surface.create("acme".into(), "Acme".into(), None, "acme.db".into(), None, Utc::now());

    let content = b"hello world".to_vec();
    let hash = sha256_hex(&content);

    let status = surface
        .accept_chunk(id.as_str(), 0, 1, hash.clone(), content)
        .unwrap();

    assert!(status.completed);
    assert_eq!(status.received, 1);
    assert!(surface.assembled_path(id.as_str()).is_some());
}

#[test]
fn upload_hash_mismatch_discards_assembly() {
    let dir = tempdir().unwrap();
    let surface = DebugSurface::new(dir.path().to_path_buf());
    let id = surface.create("acme".into(), "Acme".into(), None, "acme.db".into(), None, Utc::now());

    let status = surface
        .accept_chunk(id.as_str(), 0, 1, "deadbeef".repeat(8), b"hello".to_vec())
        .unwrap();

    assert!(!status.completed);
    assert!(surface.assembled_path(id.as_str()).is_none());
}

#[test]
fn upload_multi_chunk_assembles_in_index_order() {
    let dir = tempdir().unwrap();
    let surface = DebugSurface::new(dir.path().to_path_buf());
    let id = surface.create("acme".into(), "Acme".into(), None, "acme.db".into(), None, Utc::now());

    let full = b"abcdef".to_vec();
    let hash = sha256_hex(&full);

    surface.accept_chunk(id.as_str(), 1, 2, hash.clone(), b"def".to_vec()).unwrap();
    let status = surface
        .accept_chunk(id.as_str(), 0, 2, hash, b"abc".to_vec())
        .unwrap();

    assert!(status.completed);
    let path = surface.assembled_path(id.as_str()).unwrap();
    assert_eq!(std::fs::read(path).unwrap(), full);
}

#[test]
fn chunk_index_out_of_range_is_rejected() {
    let dir = tempdir().unwrap();
    let surface = DebugSurface::new(dir.path().to_path_buf());
    let id = surface.create("acme".into(), "Acme".into(), None, "acme.db".into(), None, Utc::now());

    let err = surface.accept_chunk(id.as_str(), 5, 2, "hash".into(), vec![]).unwrap_err();
    assert!(matches!(err, DebugSurfaceError::ChunkOutOfRange { .. }));
}

#[test]
fn logs_buffer_recent_lines_for_new_subscribers() {
    let dir = tempdir().unwrap();
    let surface = DebugSurface::new(dir.path().to_path_buf());
    surface.push_log("svc", "line 1".into());
    surface.push_log("svc", "line 2".into());

    let (buffered, _rx) = surface.subscribe_logs("svc");
    assert_eq!(buffered, vec!["line 1".to_string(), "line 2".to_string()]);
}

#[test]
fn expired_records_are_listed_past_timeout() {
    let dir = tempdir().unwrap();
    let surface = DebugSurface::new(dir.path().to_path_buf());
    let id = surface.create("acme".into(), "Acme".into(), None, "acme.db".into(), None, Utc::now() - chrono::Duration::hours(2));

    let expired = surface.expired(Utc::now(), chrono::Duration::hours(1));
    assert_eq!(expired, vec![id.as_str().to_string()]);
}
