/// Integration tests for the HTTP event stream
mod common;

use common::TestHarness;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server(harness: &TestHarness) -> (std::net::SocketAddr, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(toolweave::events::http::serve(
        listener,
        harness.hub.clone(),
        shutdown.clone(),
    ));
    (addr, shutdown)
}

#[tokio::test]
async fn test_stream_delivers_job_notifications() {
    let harness = TestHarness::new();
    let (addr, shutdown) = start_server(&harness).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /events HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
        .await
        .unwrap();

    timeout(WAIT, async {
        while harness.hub.connection_count() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("observer never registered");

    let id = harness.jobs.create_job().await;
    let expected = format!(
        "event: job_update\ndata: {{\"type\":\"JOB_CREATED\",\"jobId\":\"{}\",\"status\":\"pending\"}}\n\n",
        id
    );

    let mut received = String::new();
    let mut buf = [0u8; 1024];
    timeout(WAIT, async {
        while !received.contains(&expected) {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "stream closed early: {}", received);
            received.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
    })
    .await
    .expect("job notification never arrived");

    let lowered = received.to_ascii_lowercase();
    assert!(lowered.starts_with("http/1.1 200"));
    assert!(lowered.contains("content-type: text/event-stream"));

    shutdown.cancel();
    harness.hub.shutdown();
}

#[tokio::test]
async fn test_health_endpoint() {
    let harness = TestHarness::new();
    let (addr, shutdown) = start_server(&harness).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    timeout(WAIT, stream.read_to_string(&mut response))
        .await
        .expect("health check timed out")
        .unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("ok"));
    shutdown.cancel();
}

#[tokio::test]
async fn test_notify_without_observers_does_nothing() {
    let harness = TestHarness::new();
    let id = harness.jobs.create_job().await;
    assert!(harness.jobs.start_job(&id).await);
    assert_eq!(harness.hub.connection_count(), 0);
    assert_eq!(harness.hub.notify("job_update", &serde_json::json!({})), 0);
}
