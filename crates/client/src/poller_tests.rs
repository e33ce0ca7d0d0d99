use super::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Binds a server that always replies with `response` to every request.
async fn spawn_fixed_response_server(response: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { break };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });
    port
}

fn config_for(port: u16) -> PollerConfig {
    PollerConfig {
        gateway_base_url: format!("http://127.0.0.1:{port}"),
        poll_interval: Duration::from_millis(20),
        request_timeout: Duration::from_millis(500),
        subscriber_capacity: 4,
    }
}

#[tokio::test]
async fn subscriber_receives_advanced_sequence() {
    let body = serde_json::json!({ "admin": 7 }).to_string();
    let response = format!("HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}", body.len(), body);
    let port = spawn_fixed_response_server(Box::leak(response.into_boxed_str())).await;

    let poller = EventPoller::spawn(reqwest::Client::new(), config_for(port));
    let mut rx = poller.subscribe("admin");

    let sequence = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert_eq!(sequence, 7);
    poller.stop();
}

#[tokio::test]
async fn not_modified_response_sends_nothing() {
    let port = spawn_fixed_response_server("HTTP/1.1 304 Not Modified\r\nContent-Length: 0\r\n\r\n").await;

    let poller = EventPoller::spawn(reqwest::Client::new(), config_for(port));
    let mut rx = poller.subscribe("admin");

    let result = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(result.is_err(), "expected no notification before the timeout");
    poller.stop();
}

#[tokio::test]
async fn full_subscriber_buffer_drops_the_update_without_blocking() {
    let body = serde_json::json!({ "admin": 1 }).to_string();
    let response = format!("HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}", body.len(), body);
    let port = spawn_fixed_response_server(Box::leak(response.into_boxed_str())).await;

    let mut config = config_for(port);
    config.subscriber_capacity = 1;
    let poller = EventPoller::spawn(reqwest::Client::new(), config);
    let rx = poller.subscribe("admin");
    drop(rx); // closed receiver: sends must not panic or block the worker

    tokio::time::sleep(Duration::from_millis(100)).await;
    poller.stop();
}
