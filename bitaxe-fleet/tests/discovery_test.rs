use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bitaxe_fleet::{discover_miners, DiscoveryConfig, DiscoveryScanner, FleetError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn mock_port(server: &mockito::Server) -> u16 {
    server
        .host_with_port()
        .rsplit(':')
        .next()
        .unwrap()
        .parse()
        .unwrap()
}

fn config(subnet: &str, port: u16, concurrency: usize) -> DiscoveryConfig {
    DiscoveryConfig {
        subnet: subnet.to_string(),
        port,
        concurrency,
        timeout: Duration::from_millis(500),
    }
}

#[tokio::test]
async fn test_two_stage_confirmation_finds_single_miner() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body("<html><title>NerdQAxe Dashboard</title></html>")
        .create_async()
        .await;
    server
        .mock("GET", "/api/system/info")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"version": "2.1.0", "uptime": 1234}"#)
        .create_async()
        .await;

    // 127.0.0.0/30 has two usable hosts: .1 serves the mock endpoints,
    // .2 refuses the connection
    let port = mock_port(&server);
    let scanner = DiscoveryScanner::new(config("127.0.0.0/30", port, 8)).unwrap();
    let found = scanner.discover().await.unwrap();

    let expected: HashSet<String> = [format!("127.0.0.1:{}", port)].into_iter().collect();
    assert_eq!(found, expected);
}

#[tokio::test]
async fn test_signature_without_api_is_discarded() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body("a page that mentions NerdQAxe but is not a miner")
        .create_async()
        .await;
    // No /api/system/info mock; mockito answers 501 for unmatched paths

    let port = mock_port(&server);
    let found = discover_miners(config("127.0.0.0/30", port, 8))
        .await
        .unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn test_unrecognized_info_payload_is_discarded() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body("NerdQAxe")
        .create_async()
        .await;
    server
        .mock("GET", "/api/system/info")
        .with_status(200)
        .with_body(r#"{"model": "generic iot gadget"}"#)
        .create_async()
        .await;

    let port = mock_port(&server);
    let found = discover_miners(config("127.0.0.0/30", port, 8))
        .await
        .unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn test_generic_web_server_is_not_a_miner() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body("<html>router admin page</html>")
        .create_async()
        .await;

    let port = mock_port(&server);
    let found = discover_miners(config("127.0.0.0/30", port, 8))
        .await
        .unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn test_invalid_subnet_distinct_from_empty_result() {
    let err = discover_miners(config("bogus/24", 80, 8)).await.unwrap_err();
    assert!(matches!(err, FleetError::InvalidSubnet(_)));

    // All-unreachable is a legitimate empty result, not an error
    let found = discover_miners(config("127.0.0.0/30", 9, 8)).await.unwrap();
    assert!(found.is_empty());
}

/// Minimal miner lookalike that tracks how many requests it is serving
/// at once. Listens on all interfaces so every loopback alias in the
/// scanned subnet lands on it.
async fn spawn_counting_miner(
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
) -> u16 {
    let listener = TcpListener::bind("0.0.0.0:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let active = active.clone();
            let peak = peak.clone();

            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]);

                let current = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(current, Ordering::SeqCst);

                // Hold the request long enough for overlap to show up
                tokio::time::sleep(Duration::from_millis(20)).await;

                let body = if request.starts_with("GET /api/system/info") {
                    r#"{"version": "2.1.0"}"#
                } else {
                    "<html>NerdQAxe</html>"
                };
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;

                active.fetch_sub(1, Ordering::SeqCst);
            });
        }
    });

    port
}

#[tokio::test]
async fn test_concurrency_gate_bounds_in_flight_probes() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let port = spawn_counting_miner(active.clone(), peak.clone()).await;

    // 30 hosts, gate of 5: every host resolves to the counting server
    let found = discover_miners(config("127.0.0.0/27", port, 5))
        .await
        .unwrap();

    assert_eq!(found.len(), 30);
    assert!(
        peak.load(Ordering::SeqCst) <= 5,
        "peak in-flight {} exceeded the gate",
        peak.load(Ordering::SeqCst)
    );
    assert_eq!(active.load(Ordering::SeqCst), 0);
}
