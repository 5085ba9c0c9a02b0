use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::connection::{
    RemoteSession, SessionEvent, SessionState, StatusClassification, StatusUpdate, classify,
};
use crate::error::RemoteError;
use crate::net::RemoteTransport;
use crate::protocol::daap::{DmapDecoder, DmapEncoder, ResponseTree, codes};
use crate::protocol::dacp::{DacpCommand, SearchField, SearchPredicate};
use crate::protocol::pairing::{
    CREDENTIAL_OFFSET, MemoryCredentialStore, PairingCredential, PairingListener, StoredPairing,
};
use crate::testing::{
    ScriptedReply, ScriptedTransport, bodies, status_body, status_body_with_remaining,
};
use crate::types::RemoteConfig;

const STATUS: &str = "/ctrl-int/1/playstatusupdate";

fn config() -> RemoteConfig {
    RemoteConfig::builder()
        .host("127.0.0.1")
        .reconnect(2, Duration::from_millis(10))
        .build()
}

fn script_login(transport: &ScriptedTransport, session_id: u32) {
    transport
        .push_body("/login", bodies::login(session_id))
        .push_body("/databases", bodies::databases(41, 0xABCD, "Library"));
}

fn session(transport: &Arc<ScriptedTransport>) -> RemoteSession {
    RemoteSession::new(
        config(),
        Arc::clone(transport) as Arc<dyn RemoteTransport>,
        Box::new(MemoryCredentialStore::new()),
    )
}

async fn active_session(transport: &Arc<ScriptedTransport>) -> RemoteSession {
    script_login(transport, 77);
    let session = session(transport);
    session
        .login(PairingCredential::from_u64(1))
        .await
        .unwrap();
    session
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("listener dropped")
}

async fn next_status(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> StatusUpdate {
    loop {
        if let SessionEvent::Status(update) = next_event(rx).await {
            return update;
        }
    }
}

async fn next_state(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> (SessionState, SessionState) {
    loop {
        if let SessionEvent::StateChanged { old, new } = next_event(rx).await {
            return (old, new);
        }
    }
}

fn status_tree(build: impl FnOnce(&mut DmapEncoder)) -> ResponseTree {
    let mut enc = DmapEncoder::new();
    enc.container(codes::CMST, build);
    DmapDecoder::new().decode(&enc.finish()).unwrap()
}

// --- state.rs tests ---

#[test]
fn test_session_state_predicates() {
    assert!(SessionState::Active.is_active());
    assert!(!SessionState::Reconnecting.is_active());
    assert!(SessionState::PairedConnecting.is_connecting());
    assert!(SessionState::Reconnecting.is_connecting());
    assert!(SessionState::Unpaired.needs_pairing());
    assert!(SessionState::Stopped.is_idle());
    assert!(SessionState::Disconnected.is_idle());
    assert!(!SessionState::Active.is_idle());
    assert_eq!(SessionState::PairedConnecting.to_string(), "connecting");
}

// --- status.rs tests ---

#[test]
fn test_classify_remaining_time_alone_is_a_tick() {
    let diff = status_tree(|e| {
        e.u32(codes::CMSR, 12);
        e.u32(codes::CANT, 41_000);
    });
    let class = classify(&diff);

    assert!(class.is_ignorable_tick());
    assert!(!class.track_changed);
    assert!(!class.play_state_changed);
    assert!(!class.is_noop());
}

#[test]
fn test_classify_track_change() {
    let diff = status_tree(|e| {
        e.raw(codes::CANP, &[0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 1, 0x2C]);
        e.string(codes::CANN, "Next");
        e.u32(codes::CANT, 200_000);
    });
    let class = classify(&diff);

    assert!(class.track_changed);
    assert!(class.metadata_changed);
    assert!(!class.progress_only);
}

#[test]
fn test_classify_play_state_and_noop() {
    let paused = status_tree(|e| e.u8(codes::CAPS, 3));
    assert_eq!(
        classify(&paused),
        StatusClassification {
            play_state_changed: true,
            ..StatusClassification::default()
        }
    );

    let revision_only = status_tree(|e| e.u32(codes::CMSR, 13));
    assert!(classify(&revision_only).is_noop());
    assert!(classify(&ResponseTree::new()).is_noop());
}

#[test]
fn test_classify_root_scope() {
    let mut enc = DmapEncoder::new();
    enc.u8(codes::CASH, 1);
    let diff = DmapDecoder::new().decode(&enc.finish()).unwrap();
    assert!(classify(&diff).metadata_changed);
}

// --- manager.rs tests: login ---

#[tokio::test]
async fn test_connect_without_credential_needs_pairing() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = session(&transport);

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, RemoteError::PairingRequired { .. }));
    assert!(err.needs_pairing());
    assert_eq!(session.state(), SessionState::Unpaired);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_connect_with_stored_credential() {
    let transport = Arc::new(ScriptedTransport::new());
    script_login(&transport, 77);
    let store = MemoryCredentialStore::with_pairing(
        "127.0.0.1:3689",
        StoredPairing {
            credential: PairingCredential::from_u64(0xAB),
            service_name: None,
        },
    );
    let session = RemoteSession::new(config(), transport.clone(), Box::new(store));
    let mut states = session.subscribe_state();

    session.connect().await.unwrap();

    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), SessionState::Active);
    assert_eq!(session.session_id().await.as_deref(), Some("77"));
    let db = session.database().await.unwrap();
    assert_eq!(db.id, 41);
    assert_eq!(db.persistent_id, 0xABCD);

    let logins = transport.requests_to("/login");
    assert_eq!(
        logins[0].path_and_query,
        "/login?pairing-guid=0x00000000000000AB"
    );
    assert_eq!(
        transport.requests_to("/databases")[0].path_and_query,
        "/databases?session-id=77"
    );
}

#[tokio::test]
async fn test_connect_twice_is_invalid() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = active_session(&transport).await;

    let err = session
        .login(PairingCredential::from_u64(1))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::InvalidState { .. }));
}

#[tokio::test]
async fn test_rejected_login_moves_to_unpaired() {
    for status in [401, 403, 503] {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push("/login", ScriptedReply::Status(status));
        let session = session(&transport);

        let err = session
            .login(PairingCredential::from_u64(1))
            .await
            .unwrap_err();
        assert!(
            matches!(err, RemoteError::PairingRejected { status: s, .. } if s == status),
            "status {status}: {err:?}"
        );
        assert_eq!(session.state(), SessionState::Unpaired);
    }
}

#[tokio::test]
async fn test_unreachable_server_is_not_a_pairing_problem() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push("/login", ScriptedReply::ConnectionRefused);
    let session = session(&transport);

    let err = session
        .login(PairingCredential::from_u64(1))
        .await
        .unwrap_err();
    assert!(!err.needs_pairing());
    assert!(err.is_connection_lost());
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_login_without_session_id_is_a_protocol_error() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_body("/login", bodies::server_info("not a login"));
    let session = session(&transport);

    let err = session
        .login(PairingCredential::from_u64(1))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::ProtocolState { .. }));
    assert!(transport.requests_to("/databases").is_empty());
}

// --- manager.rs tests: commands and queries ---

#[tokio::test]
async fn test_commands_need_login() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = session(&transport);

    let err = session.play_pause().await.unwrap_err();
    assert!(matches!(err, RemoteError::InvalidState { .. }));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_transport_commands() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = active_session(&transport).await;
    for command in ["playpause", "nextitem", "previtem", "stop"] {
        transport.push_body(&format!("/ctrl-int/1/{command}"), Vec::new());
    }

    session.play_pause().await.unwrap();
    session.next_item().await.unwrap();
    session.prev_item().await.unwrap();
    session.command(DacpCommand::Stop).await.unwrap();

    let sent: Vec<String> = transport
        .requests()
        .into_iter()
        .skip(2)
        .map(|r| r.path_and_query)
        .collect();
    assert_eq!(
        sent,
        vec![
            "/ctrl-int/1/playpause?session-id=77",
            "/ctrl-int/1/nextitem?session-id=77",
            "/ctrl-int/1/previtem?session-id=77",
            "/ctrl-int/1/stop?session-id=77",
        ]
    );
}

#[tokio::test]
async fn test_set_rating() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = active_session(&transport).await;
    transport.push_body("/ctrl-int/1/setproperty", Vec::new());

    session.set_rating(0x12C, 80).await.unwrap();
    let sent = transport.requests_to("/ctrl-int/1/setproperty");
    assert_eq!(
        sent[0].path_and_query,
        "/ctrl-int/1/setproperty?dacp.userrating=80\
         &database-spec='dmap.persistentid:0xABCD'\
         &item-spec='dmap.itemid:0x12C'&session-id=77"
    );

    let err = session.set_rating(0x12C, 101).await.unwrap_err();
    assert!(matches!(err, RemoteError::InvalidRequest { .. }));
    assert_eq!(transport.requests_to("/ctrl-int/1/setproperty").len(), 1);
}

#[tokio::test]
async fn test_volume_roundtrip() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = active_session(&transport).await;
    transport
        .push_body("/ctrl-int/1/getproperty", bodies::volume(65))
        .push_body("/ctrl-int/1/setproperty", Vec::new());

    assert_eq!(session.volume().await.unwrap(), 65);
    session.set_volume(20).await.unwrap();
    assert!(
        transport.requests_to("/ctrl-int/1/setproperty")[0]
            .path_and_query
            .starts_with("/ctrl-int/1/setproperty?dmcp.volume=20&")
    );
    assert!(matches!(
        session.set_volume(150).await,
        Err(RemoteError::InvalidRequest { .. })
    ));
}

#[tokio::test]
async fn test_item_metadata_and_search() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = active_session(&transport).await;
    let row = bodies::SongRow {
        item_id: 300,
        name: "O'Brien's Song".to_string(),
        artist: "Band".to_string(),
        ..bodies::SongRow::default()
    };
    transport
        .push_body("/databases/41/items", bodies::items(&[row.clone()]))
        .push_body("/databases/41/items", bodies::items(&[row.clone(), row]));

    let item = session.item_metadata(300).await.unwrap().unwrap();
    assert_eq!(item.get_unsigned(&[codes::MIID]), Some(300));
    assert_eq!(
        item.get_string(&[codes::MINM]).as_deref(),
        Some("O'Brien's Song")
    );

    let found = session
        .search(&[
            SearchPredicate::contains(SearchField::Title, "O'Brien's Song"),
            SearchPredicate::equals(SearchField::Artist, "Band"),
        ])
        .await
        .unwrap();
    assert_eq!(found.len(), 2);

    let sent = transport.requests_to("/databases/41/items");
    assert!(sent[0].path_and_query.contains("&query='dmap.itemid:300'"));
    assert!(sent[0].path_and_query.contains("&meta=dmap.itemname,dmap.itemid,"));
    assert!(
        sent[1]
            .path_and_query
            .contains("O%5C'Brien%5C's%20Song"),
        "{}",
        sent[1].path_and_query
    );
}

#[tokio::test]
async fn test_artwork_uses_configured_size() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = active_session(&transport).await;
    transport.push_body("/ctrl-int/1/nowplayingartwork", b"png".to_vec());

    let art = session.now_playing_artwork().await.unwrap();
    assert_eq!(art.as_ref(), b"png");
    assert!(
        transport.requests_to("/ctrl-int/1/nowplayingartwork")[0]
            .path_and_query
            .contains("mw=320&mh=320")
    );
}

// --- poll.rs tests ---

#[tokio::test]
async fn test_polling_needs_active_session() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = session(&transport);
    let (tx, _rx) = mpsc::unbounded_channel();

    let err = session.start_polling(Arc::new(tx)).await.unwrap_err();
    assert!(matches!(err, RemoteError::InvalidState { .. }));
}

#[tokio::test]
async fn test_countdown_update_is_an_ignorable_tick() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = active_session(&transport).await;
    transport
        .push_body(STATUS, status_body(5, 4, 300, "Song"))
        .push_body(STATUS, status_body_with_remaining(6, 4, 300, "Song", 59_000));

    let (tx, mut rx) = mpsc::unbounded_channel();
    session.start_polling(Arc::new(tx)).await.unwrap();

    let first = next_status(&mut rx).await;
    assert!(first.previous.is_empty());
    assert!(first.classification.track_changed);
    assert_eq!(first.revision, 5);
    assert_eq!(
        first.current.get_unsigned(&[codes::CMST, codes::MIID]),
        Some(300)
    );

    let second = next_status(&mut rx).await;
    assert!(second.classification.is_ignorable_tick());
    assert!(!second.classification.track_changed);
    assert!(!second.classification.play_state_changed);
    assert_eq!(second.revision, 6);
    assert!(Arc::ptr_eq(&second.previous, &first.current));

    let cmst = second.diff.get_branch(&[codes::CMST]);
    assert!(cmst.contains_leaf(codes::CANT));
    assert!(!cmst.contains_leaf(codes::CANN));

    let polls = transport.requests_to(STATUS);
    assert!(polls[0].path_and_query.contains("revision-number=1&"));
    assert!(polls[1].path_and_query.contains("revision-number=5&"));
    assert!(polls.iter().all(|p| p.keep_open));

    session.stop_polling().await;
    assert!(!session.is_polling().await);
}

#[tokio::test]
async fn test_poll_timeout_refreshes_once_and_stays_active() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = active_session(&transport).await;
    transport
        .push_body(STATUS, status_body(5, 4, 300, "Song"))
        .push(STATUS, ScriptedReply::Timeout)
        .push_body(STATUS, status_body(5, 4, 300, "Song"));

    let (tx, mut rx) = mpsc::unbounded_channel();
    session.start_polling(Arc::new(tx)).await.unwrap();

    next_status(&mut rx).await;
    let refreshed = next_status(&mut rx).await;
    assert!(refreshed.classification.is_noop());

    // login, databases, poll, timed-out poll, refresh, next poll
    transport.wait_for_requests(6).await;
    let polls = transport.requests_to(STATUS);
    assert_eq!(polls.len(), 4);
    assert!(polls[1].keep_open);
    assert!(polls[1].path_and_query.contains("revision-number=5&"));
    assert!(!polls[2].keep_open);
    assert!(polls[2].path_and_query.contains("revision-number=1&"));
    assert!(polls[3].keep_open);
    assert!(polls[3].path_and_query.contains("revision-number=5&"));

    assert_eq!(session.state(), SessionState::Active);
    while let Ok(event) = rx.try_recv() {
        assert!(
            !matches!(event, SessionEvent::StateChanged { .. }),
            "unexpected {event:?}"
        );
    }
    assert_eq!(transport.requests_to("/login").len(), 1);

    session.stop_polling().await;
}

#[tokio::test]
async fn test_poll_failure_reconnects() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = active_session(&transport).await;
    transport
        .push_body(STATUS, status_body(5, 4, 300, "Song"))
        .push(STATUS, ScriptedReply::ConnectionRefused);
    script_login(&transport, 78);

    let (tx, mut rx) = mpsc::unbounded_channel();
    session.start_polling(Arc::new(tx)).await.unwrap();

    next_status(&mut rx).await;
    assert_eq!(
        next_state(&mut rx).await,
        (SessionState::Active, SessionState::Reconnecting)
    );
    assert_eq!(
        next_state(&mut rx).await,
        (SessionState::Reconnecting, SessionState::Active)
    );

    // ..., failed poll, login, databases, poll at the refresh revision
    transport.wait_for_requests(7).await;
    assert_eq!(session.session_id().await.as_deref(), Some("78"));
    let last = transport.requests_to(STATUS).pop().unwrap();
    assert!(last.path_and_query.contains("revision-number=1&session-id=78"));

    session.stop_polling().await;
}

#[tokio::test]
async fn test_rejected_reconnect_moves_to_unpaired() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = active_session(&transport).await;
    transport
        .push(STATUS, ScriptedReply::ConnectionRefused)
        .push("/login", ScriptedReply::Status(503));

    let (tx, mut rx) = mpsc::unbounded_channel();
    session.start_polling(Arc::new(tx)).await.unwrap();

    assert_eq!(
        next_state(&mut rx).await,
        (SessionState::Active, SessionState::Reconnecting)
    );
    assert_eq!(
        next_state(&mut rx).await,
        (SessionState::Reconnecting, SessionState::Unpaired)
    );

    tokio::time::timeout(Duration::from_secs(5), async {
        while session.is_polling().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(transport.requests_to("/login").len(), 2);
}

#[tokio::test]
async fn test_reconnect_gives_up_after_configured_attempts() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = active_session(&transport).await;
    transport
        .push(STATUS, ScriptedReply::ConnectionRefused)
        .push("/login", ScriptedReply::ConnectionRefused)
        .push("/login", ScriptedReply::ConnectionRefused);

    let (tx, mut rx) = mpsc::unbounded_channel();
    session.start_polling(Arc::new(tx)).await.unwrap();

    assert_eq!(next_state(&mut rx).await.1, SessionState::Reconnecting);
    assert_eq!(next_state(&mut rx).await.1, SessionState::Disconnected);
    assert_eq!(transport.requests_to("/login").len(), 3);
}

#[tokio::test]
async fn test_stop_polling_mid_reconnect_leaves_session_reusable() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = active_session(&transport).await;
    transport
        .push(STATUS, ScriptedReply::ConnectionRefused)
        .push("/login", ScriptedReply::Hang);

    let (tx, mut rx) = mpsc::unbounded_channel();
    session.start_polling(Arc::new(tx)).await.unwrap();
    assert_eq!(
        next_state(&mut rx).await,
        (SessionState::Active, SessionState::Reconnecting)
    );

    tokio::time::timeout(Duration::from_secs(5), session.stop_polling())
        .await
        .unwrap();
    assert!(!session.is_polling().await);
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(
        next_state(&mut rx).await,
        (SessionState::Reconnecting, SessionState::Disconnected)
    );

    script_login(&transport, 80);
    session.login(PairingCredential::from_u64(1)).await.unwrap();
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(session.session_id().await.as_deref(), Some("80"));

    let (tx, _rx) = mpsc::unbounded_channel();
    session.start_polling(Arc::new(tx)).await.unwrap();
    session.stop_polling().await;
}

#[tokio::test]
async fn test_shutdown_stops_worker() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = active_session(&transport).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    session.start_polling(Arc::new(tx)).await.unwrap();
    transport.wait_for_requests(3).await;
    assert!(session.is_polling().await);

    tokio::time::timeout(Duration::from_secs(5), session.shutdown())
        .await
        .unwrap();

    assert!(!session.is_polling().await);
    assert!(transport.is_shut_down());
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(
        next_state(&mut rx).await,
        (SessionState::Active, SessionState::Stopped)
    );
    assert!(session.session_id().await.is_none());
}

#[tokio::test]
async fn test_logout() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = active_session(&transport).await;
    transport.push_body("/logout", Vec::new());

    session.logout().await.unwrap();

    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(
        transport.requests_to("/logout")[0].path_and_query,
        "/logout?session-id=77"
    );
    assert!(matches!(
        session.play_pause().await,
        Err(RemoteError::InvalidState { .. })
    ));
}

// --- manager.rs tests: pairing ---

async fn pair_request(addr: SocketAddr) -> PairingCredential {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            b"GET /pair?pairingcode=5A4B3C2D1E0F&servicename=0123456789ABCDEF HTTP/1.1\r\n\r\n",
        )
        .await
        .unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();

    let body = &response[response.len() - 66..];
    let mut slot = [0u8; 8];
    slot.copy_from_slice(&body[CREDENTIAL_OFFSET..CREDENTIAL_OFFSET + 8]);
    PairingCredential::from_u64(u64::from_be_bytes(slot))
}

#[tokio::test]
async fn test_pairing_stores_credential_and_logs_in() {
    let transport = Arc::new(ScriptedTransport::new());
    script_login(&transport, 77);
    let session = session(&transport);
    let listener = PairingListener::bind_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .unwrap();
    let server = tokio::spawn(pair_request(listener.local_addr()));

    let credential = session.pair_with_listener(listener).await.unwrap();
    assert_eq!(server.await.unwrap(), credential);
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(
        transport.requests_to("/login")[0].path_and_query,
        format!("/login?pairing-guid={}", credential.to_guid())
    );

    // A later connect reuses the stored credential
    transport.push_body("/logout", Vec::new());
    session.logout().await.unwrap();
    script_login(&transport, 79);
    session.connect().await.unwrap();
    assert_eq!(
        transport.requests_to("/login")[1].path_and_query,
        format!("/login?pairing-guid={}", credential.to_guid())
    );

    session.forget_pairing().await.unwrap();
}

#[tokio::test]
async fn test_pair_refused_while_active() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = active_session(&transport).await;

    let err = session.pair().await.unwrap_err();
    assert!(matches!(err, RemoteError::InvalidState { .. }), "{err:?}");
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_pairing_times_out() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = RemoteSession::new(
        RemoteConfig::builder()
            .pairing_timeout(Duration::from_millis(50))
            .build(),
        transport.clone(),
        Box::new(MemoryCredentialStore::new()),
    );
    let listener = PairingListener::bind_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .unwrap();

    let err = session.pair_with_listener(listener).await.unwrap_err();
    assert!(matches!(err, RemoteError::PairingTimeout { .. }));
    assert!(transport.requests().is_empty());
}
