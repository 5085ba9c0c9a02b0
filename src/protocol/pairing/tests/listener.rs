use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::pairing::{PairingCredential, PairingListener, pairing_ack};

async fn get(addr: SocketAddr, target: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {target} HTTP/1.1\r\nHost: remote\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    response
}

async fn listener() -> (PairingListener, SocketAddr) {
    let listener = PairingListener::bind_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .unwrap();
    let addr = listener.local_addr();
    (listener, addr)
}

#[tokio::test]
async fn test_pair_request_gets_ack_with_credential() {
    let (listener, addr) = listener().await;
    let credential = PairingCredential::from_u64(0xFEED);
    let task = listener.spawn(credential);

    let response = get(addr, "/pair?pairingcode=ABCDEF&servicename=0F1E2D3C4B5A6978").await;
    let request = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(request.pairing_code.as_deref(), Some("ABCDEF"));
    assert_eq!(request.service_name.as_deref(), Some("0F1E2D3C4B5A6978"));

    let text = String::from_utf8_lossy(&response);
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("Content-Length: 66\r\n"));
    assert!(response.ends_with(&pairing_ack(credential)));
}

#[tokio::test]
async fn test_other_paths_are_refused_and_listener_keeps_waiting() {
    let (listener, addr) = listener().await;
    let task = listener.spawn(PairingCredential::from_u64(1));

    let response = get(addr, "/favicon.ico").await;
    assert!(String::from_utf8_lossy(&response).starts_with("HTTP/1.1 404"));
    assert!(!task.is_finished());

    get(addr, "/pair?pairingcode=00").await;
    let request = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(request.service_name, None);
}

#[tokio::test]
async fn test_idle_connection_does_not_block_pair_request() {
    let (listener, addr) = listener().await;
    let credential = PairingCredential::from_u64(0xBEEF);
    let task = listener.spawn(credential);

    // Connected but silent, held open for the whole test
    let _idle = TcpStream::connect(addr).await.unwrap();

    let response = tokio::time::timeout(
        Duration::from_secs(3),
        get(addr, "/pair?pairingcode=11&servicename=AA"),
    )
    .await
    .expect("pair request blocked behind idle connection");
    assert!(response.ends_with(&pairing_ack(credential)));

    let request = tokio::time::timeout(Duration::from_secs(3), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(request.service_name.as_deref(), Some("AA"));
}

#[tokio::test]
async fn test_ephemeral_port_is_reported() {
    let (listener, addr) = listener().await;
    assert_ne!(listener.port(), 0);
    assert_eq!(listener.port(), addr.port());
}
