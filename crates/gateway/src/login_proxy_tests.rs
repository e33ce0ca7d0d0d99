use super::*;
use crate::test_support::build_harness;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tower::ServiceExt;

/// Binds a mock admin server on the already-allocated `port` (nothing else
/// listens there — the harness's "admin" instance is a sleeping shell
/// script, not a real HTTP server) and replies `response` to every request.
async fn spawn_admin_mock(port: u16, response: &'static str) {
    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });
}

#[tokio::test]
async fn login_forwards_to_admin_public_login() {
    let harness = build_harness(2).await;
    let (_, port) = harness.supervisor.get_by_id_with_wait("admin", Duration::from_secs(1)).await.unwrap();
    spawn_admin_mock(port, "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok").await;

    let router = crate::routing::build_router(harness.state);
    let response = router
        .oneshot(Request::post("/public/login").body(Body::from("{}")).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn access_token_without_refresh_cookie_returns_login_url() {
    let harness = build_harness(2).await;
    let router = crate::routing::build_router(harness.state);

    let response = router
        .oneshot(
            Request::post("/public/access_token")
                .header("host", "nexushub.example.com:443")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["login_url"].as_str().unwrap().starts_with("nexushub.example.com"));
}

#[tokio::test]
async fn access_token_with_valid_cookie_rotates_refresh_cookie() {
    let harness = build_harness(2).await;
    let (_, port) = harness.supervisor.get_by_id_with_wait("admin", Duration::from_secs(1)).await.unwrap();

    let body = serde_json::json!({
        "access_token": "new-access",
        "refresh_token": "new-refresh",
        "expiry": chrono::Utc::now() + chrono::Duration::minutes(15),
    })
    .to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    spawn_admin_mock(port, Box::leak(response.into_boxed_str())).await;

    let router = crate::routing::build_router(harness.state);
    let response = router
        .oneshot(
            Request::post("/public/access_token")
                .header("host", "nexushub.example.com:443")
                .header("cookie", "YRT=old-refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap().to_string();
    assert!(set_cookie.contains("YRT=new-refresh"));
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["access_token"], "new-access");
}
