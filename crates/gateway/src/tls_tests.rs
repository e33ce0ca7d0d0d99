use super::*;
use std::path::PathBuf;

#[tokio::test]
async fn missing_cert_file_is_a_read_error() {
    let err = load_rustls_config(&PathBuf::from("/nonexistent/cert.pem"), &PathBuf::from("/nonexistent/key.pem"))
        .await
        .unwrap_err();
    assert!(matches!(err, TlsConfigError::ReadCert { .. }));
}

#[tokio::test]
async fn missing_key_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let cert_path = dir.path().join("cert.pem");
    std::fs::write(&cert_path, b"-----BEGIN CERTIFICATE-----\n-----END CERTIFICATE-----\n").unwrap();

    let err = load_rustls_config(&cert_path, &PathBuf::from("/nonexistent/key.pem")).await.unwrap_err();
    assert!(matches!(err, TlsConfigError::ReadKey { .. }));
}
