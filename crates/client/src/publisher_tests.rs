use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Binds an ephemeral server that replies with `responses[n]` to the
/// `n`th accepted connection, repeating the last entry once exhausted.
/// Returns the port and a counter of accepted connections.
async fn spawn_sequenced_server(responses: Vec<&'static str>) -> (u16, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = counter.clone();
    let responses = Arc::new(responses);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { break };
            let index = counter_clone.fetch_add(1, Ordering::SeqCst);
            let responses = responses.clone();
            tokio::spawn(async move {
                let response = responses.get(index).copied().unwrap_or(responses[responses.len() - 1]);
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });

    (port, counter)
}

fn config_for(port: u16) -> PublisherConfig {
    PublisherConfig {
        gateway_base_url: format!("http://127.0.0.1:{port}"),
        initial_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
        request_timeout: Duration::from_millis(500),
    }
}

#[tokio::test]
async fn successful_publish_is_not_retried() {
    let (port, counter) = spawn_sequenced_server(vec!["HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"]).await;
    let publisher = EventPublisher::spawn(reqwest::Client::new(), config_for(port));

    publisher.publish("deploy", serde_json::json!({ "ok": true }));
    assert!(publisher.flush(Duration::from_secs(2)).await);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn client_error_is_discarded_without_retry() {
    let (port, counter) = spawn_sequenced_server(vec!["HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n"]).await;
    let publisher = EventPublisher::spawn(reqwest::Client::new(), config_for(port));

    publisher.publish("deploy", serde_json::json!({}));
    assert!(publisher.flush(Duration::from_secs(2)).await);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn server_error_is_retried_until_success() {
    let (port, counter) = spawn_sequenced_server(vec![
        "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n",
        "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n",
        "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n",
    ])
    .await;
    let publisher = EventPublisher::spawn(reqwest::Client::new(), config_for(port));

    publisher.publish("deploy", serde_json::json!({}));
    assert!(publisher.flush(Duration::from_secs(2)).await);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn flush_with_empty_queue_returns_immediately() {
    let (port, _counter) = spawn_sequenced_server(vec!["HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"]).await;
    let publisher = EventPublisher::spawn(reqwest::Client::new(), config_for(port));
    assert!(publisher.flush(Duration::from_millis(200)).await);
}

#[tokio::test]
async fn flush_times_out_while_connection_is_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let publisher = EventPublisher::spawn(
        reqwest::Client::new(),
        PublisherConfig {
            gateway_base_url: format!("http://127.0.0.1:{port}"),
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(1),
            request_timeout: Duration::from_millis(200),
        },
    );

    publisher.publish("deploy", serde_json::json!({}));
    assert!(!publisher.flush(Duration::from_millis(50)).await);
    publisher.stop();
}
