//! Pairing through the listener and reuse of the stored credential

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use dacp_remote::protocol::pairing::{
    CREDENTIAL_OFFSET, CredentialStore, PairingListener, StoredPairing,
};
use dacp_remote::testing::MockDmapServer;
use dacp_remote::{FileCredentialStore, PairingCredential, RemoteConfig, RemoteSession, SessionState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Play the server's side of the handshake and read back the credential
async fn send_pair_request(addr: SocketAddr) -> PairingCredential {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            b"GET /pair?pairingcode=0F1E2D3C4B5A&servicename=FEDCBA9876543210 HTTP/1.1\r\n\
              Host: remote\r\n\r\n",
        )
        .await
        .unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();

    let head = String::from_utf8_lossy(&response[..12]);
    assert!(head.starts_with("HTTP/1.1 200"), "unexpected reply: {head}");

    let body = &response[response.len() - 66..];
    let mut slot = [0u8; 8];
    slot.copy_from_slice(&body[CREDENTIAL_OFFSET..CREDENTIAL_OFFSET + 8]);
    PairingCredential::from_u64(u64::from_be_bytes(slot))
}

fn config(server: &MockDmapServer) -> RemoteConfig {
    let addr = server.address().expect("server not started");
    RemoteConfig::builder()
        .host(addr.ip().to_string())
        .port(addr.port())
        .pairing_timeout(Duration::from_secs(5))
        .build()
}

#[tokio::test]
async fn test_paired_credential_survives_restart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pairings.json");

    let mut server = MockDmapServer::default_server();
    server.start().await.unwrap();

    let credential = {
        let store = FileCredentialStore::new(&path).await.unwrap();
        let session = RemoteSession::with_http(config(&server), Box::new(store)).unwrap();
        assert_eq!(session.state(), SessionState::Unpaired);

        let listener = PairingListener::bind_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .await
            .unwrap();
        let pairing_server = tokio::spawn(send_pair_request(listener.local_addr()));

        let credential = session.pair_with_listener(listener).await.unwrap();
        assert_eq!(pairing_server.await.unwrap(), credential);
        assert_eq!(session.state(), SessionState::Active);
        session.logout().await.unwrap();
        credential
    };

    let store = FileCredentialStore::new(&path).await.unwrap();
    let stored = store.load(&config(&server).server_id()).await.unwrap();
    assert_eq!(stored.credential, credential);
    assert_eq!(stored.service_name.as_deref(), Some("FEDCBA9876543210"));

    let session = RemoteSession::with_http(config(&server), Box::new(store)).unwrap();
    session.connect().await.unwrap();
    assert_eq!(session.state(), SessionState::Active);

    let logins: Vec<String> = server
        .requests()
        .await
        .into_iter()
        .filter(|r| r.starts_with("/login"))
        .collect();
    assert_eq!(logins.len(), 2);
    assert!(logins.iter().all(|r| r.contains(&credential.to_guid())));

    session.shutdown().await;
}

#[tokio::test]
async fn test_forget_pairing_requires_pairing_again() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("pairings.json");

    let mut server = MockDmapServer::default_server();
    server.start().await.unwrap();

    let mut store = FileCredentialStore::new(&path).await.unwrap();
    store
        .save(
            &config(&server).server_id(),
            &StoredPairing {
                credential: PairingCredential::from_u64(0xFEED),
                service_name: None,
            },
        )
        .await
        .unwrap();

    let session = RemoteSession::with_http(config(&server), Box::new(store)).unwrap();
    session.connect().await.unwrap();
    session.logout().await.unwrap();
    session.forget_pairing().await.unwrap();

    let store = FileCredentialStore::new(&path).await.unwrap();
    assert!(store.list_servers().await.is_empty());

    let session = RemoteSession::with_http(config(&server), Box::new(store)).unwrap();
    let err = session.connect().await.unwrap_err();
    assert!(err.needs_pairing());
    assert_eq!(session.state(), SessionState::Unpaired);
}
