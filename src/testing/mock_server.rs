//! Mock DACP server for testing purposes.
//!
//! Speaks just enough HTTP/1.1 to answer the requests a remote sends:
//! server info, login, database listing, the play-status long poll, transport
//! commands, properties, item lookups and artwork. Each connection carries a
//! single request and is closed after the response.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, watch};

use super::bodies::{self, SongRow};
use crate::protocol::daap::{PlayStatusFields, encode_play_status};
use crate::protocol::dacp::{CTRL_INT_PREFIX, DacpCommand};
use crate::protocol::pairing::PairingCredential;

const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// Bytes served as now-playing artwork
pub const MOCK_ARTWORK: &[u8] = b"\x89PNG\r\n\x1a\nmock-artwork";

/// Configuration for the mock DACP server.
#[derive(Debug, Clone)]
pub struct MockDmapConfig {
    /// Port to listen on, 0 for an ephemeral port.
    pub port: u16,
    /// Library name returned by `/server-info` and `/databases`.
    pub library_name: String,
    /// Session id handed out by `/login`.
    pub session_id: u32,
    /// Id of the single library database.
    pub database_id: u32,
    /// Persistent id of the library database.
    pub database_persistent_id: u64,
    /// Credential accepted by `/login`; any credential when `None`.
    pub accepted_credential: Option<PairingCredential>,
    /// Songs served by item lookups and searches.
    pub songs: Vec<SongRow>,
}

impl Default for MockDmapConfig {
    fn default() -> Self {
        Self {
            port: 0,
            library_name: "Mock Library".to_string(),
            session_id: 0x1D2C,
            database_id: 41,
            database_persistent_id: 0x00A1_B2C3_D4E5_F607,
            accepted_credential: None,
            songs: vec![SongRow {
                item_id: 101,
                name: "First Song".to_string(),
                artist: "Mock Artist".to_string(),
                album: "Mock Album".to_string(),
                duration_ms: 180_000,
                rating: 60,
            }],
        }
    }
}

/// Player model behind the play-status responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPlayer {
    /// Current `cmsr` revision.
    pub revision: u32,
    /// `caps`: 2 stopped, 3 paused, 4 playing.
    pub player_state: u8,
    /// Item id of the playing track.
    pub item_id: u32,
    /// Track title.
    pub title: String,
    /// Track artist.
    pub artist: String,
    /// Track album.
    pub album: String,
    /// Remaining time in milliseconds.
    pub remaining_ms: u32,
    /// Track length in milliseconds.
    pub total_ms: u32,
}

impl Default for MockPlayer {
    fn default() -> Self {
        Self {
            revision: 2,
            player_state: 4,
            item_id: 101,
            title: "First Song".to_string(),
            artist: "Mock Artist".to_string(),
            album: "Mock Album".to_string(),
            remaining_ms: 120_000,
            total_ms: 180_000,
        }
    }
}

/// Internal state of the mock server.
struct ServerState {
    player: MockPlayer,
    volume: u8,
    last_rating: Option<(u8, String)>,
    login_status: u16,
    requests: Vec<String>,
}

struct Shared {
    state: RwLock<ServerState>,
    revision: watch::Sender<u32>,
    stopped: watch::Sender<bool>,
}

impl Shared {
    async fn update_player(&self, change: impl FnOnce(&mut MockPlayer)) {
        let revision = {
            let mut state = self.state.write().await;
            change(&mut state.player);
            state.player.revision += 1;
            state.player.revision
        };
        self.revision.send_replace(revision);
    }
}

/// A mock DACP server.
///
/// Long polls at the current revision are held open until the player model
/// changes, either through a transport command or one of the `set_*`
/// helpers.
pub struct MockDmapServer {
    config: MockDmapConfig,
    shared: Arc<Shared>,
    address: Option<SocketAddr>,
}

impl MockDmapServer {
    /// Creates a new `MockDmapServer` with the specified configuration.
    #[must_use]
    pub fn new(config: MockDmapConfig) -> Self {
        let player = MockPlayer::default();
        let (revision, _) = watch::channel(player.revision);
        let (stopped, _) = watch::channel(false);

        Self {
            config,
            shared: Arc::new(Shared {
                state: RwLock::new(ServerState {
                    player,
                    volume: 50,
                    last_rating: None,
                    login_status: 200,
                    requests: Vec::new(),
                }),
                revision,
                stopped,
            }),
            address: None,
        }
    }

    /// Creates a new `MockDmapServer` with default configuration.
    #[must_use]
    pub fn default_server() -> Self {
        Self::new(MockDmapConfig::default())
    }

    /// Starts the server.
    ///
    /// Returns the socket address the server is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start(&mut self) -> Result<SocketAddr, std::io::Error> {
        let listener = TcpListener::bind(format!("127.0.0.1:{}", self.config.port)).await?;
        let addr = listener.local_addr()?;
        self.address = Some(addr);

        let shared = Arc::clone(&self.shared);
        let config = Arc::new(self.config.clone());
        let mut stopped = self.shared.stopped.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shared = Arc::clone(&shared);
                                let config = Arc::clone(&config);
                                tokio::spawn(async move {
                                    if let Err(e) = handle_connection(stream, &shared, &config).await {
                                        tracing::debug!("mock connection error: {}", e);
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                            }
                        }
                    }
                    _ = stopped.wait_for(|s| *s) => {
                        break;
                    }
                }
            }
        });

        Ok(addr)
    }

    /// Stops the server and releases held long polls.
    pub fn stop(&mut self) {
        self.shared.stopped.send_replace(true);
    }

    /// Returns the address the server is listening on.
    #[must_use]
    pub fn address(&self) -> Option<SocketAddr> {
        self.address
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MockDmapConfig {
        &self.config
    }

    /// Request targets received so far, in arrival order.
    pub async fn requests(&self) -> Vec<String> {
        self.shared.state.read().await.requests.clone()
    }

    /// Snapshot of the player model.
    pub async fn player(&self) -> MockPlayer {
        self.shared.state.read().await.player.clone()
    }

    /// Current volume.
    pub async fn volume(&self) -> u8 {
        self.shared.state.read().await.volume
    }

    /// Last rating set, with the item spec it was applied to.
    pub async fn last_rating(&self) -> Option<(u8, String)> {
        self.shared.state.read().await.last_rating.clone()
    }

    /// Status answered to every later `/login`.
    pub async fn set_login_status(&self, status: u16) {
        self.shared.state.write().await.login_status = status;
    }

    /// Switch to a new track and bump the revision.
    pub async fn set_track(&self, item_id: u32, title: &str, artist: &str, album: &str) {
        self.shared
            .update_player(|p| {
                p.item_id = item_id;
                p.title = title.to_string();
                p.artist = artist.to_string();
                p.album = album.to_string();
                p.remaining_ms = p.total_ms;
            })
            .await;
    }

    /// Change only the remaining time and bump the revision.
    pub async fn set_remaining(&self, remaining_ms: u32) {
        self.shared
            .update_player(|p| p.remaining_ms = remaining_ms)
            .await;
    }
}

impl Drop for MockDmapServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    shared: &Shared,
    config: &MockDmapConfig,
) -> std::io::Result<()> {
    let head = read_request_head(&mut stream).await?;
    let Some(target) = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
    else {
        return respond(&mut stream, 400, "text/plain", b"bad request").await;
    };

    shared.state.write().await.requests.push(target.clone());

    let (path, query) = target.split_once('?').unwrap_or((target.as_str(), ""));
    let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    let (status, content_type, body) = route(path, &params, shared, config).await;
    respond(&mut stream, status, content_type, &body).await
}

async fn route(
    path: &str,
    params: &HashMap<String, String>,
    shared: &Shared,
    config: &MockDmapConfig,
) -> (u16, &'static str, Vec<u8>) {
    const DMAP: &str = "application/x-dmap-tagged";

    if path == "/server-info" {
        return (200, DMAP, bodies::server_info(&config.library_name));
    }
    if path == "/login" {
        return login(params, shared, config).await;
    }

    let session = config.session_id.to_string();
    if params.get("session-id") != Some(&session) {
        return (403, "text/plain", b"invalid session".to_vec());
    }

    if path == "/logout" {
        return (204, DMAP, Vec::new());
    }
    if path == "/databases" {
        return (
            200,
            DMAP,
            bodies::databases(
                config.database_id,
                config.database_persistent_id,
                &config.library_name,
            ),
        );
    }
    if let Some(rest) = path.strip_prefix("/databases/") {
        return items(rest, params, config);
    }

    let Some(name) = path.strip_prefix(CTRL_INT_PREFIX) else {
        return (404, "text/plain", b"not found".to_vec());
    };
    match name {
        "playstatusupdate" => (200, DMAP, play_status(params, shared).await),
        "getproperty" => (200, DMAP, bodies::volume(shared.state.read().await.volume)),
        "setproperty" => set_property(params, shared).await,
        "nowplayingartwork" => (200, "image/png", MOCK_ARTWORK.to_vec()),
        _ => match DacpCommand::from_path(path) {
            Some(command) => {
                apply_command(command, shared).await;
                (204, DMAP, Vec::new())
            }
            None => (404, "text/plain", b"unknown command".to_vec()),
        },
    }
}

async fn login(
    params: &HashMap<String, String>,
    shared: &Shared,
    config: &MockDmapConfig,
) -> (u16, &'static str, Vec<u8>) {
    let status = shared.state.read().await.login_status;
    if status != 200 {
        return (status, "text/plain", b"login refused".to_vec());
    }
    let presented = params
        .get("pairing-guid")
        .and_then(|guid| guid.parse::<PairingCredential>().ok());
    let accepted = match config.accepted_credential {
        Some(expected) => presented == Some(expected),
        None => presented.is_some(),
    };
    if accepted {
        (200, "application/x-dmap-tagged", bodies::login(config.session_id))
    } else {
        (503, "text/plain", b"unknown pairing".to_vec())
    }
}

fn items(
    rest: &str,
    params: &HashMap<String, String>,
    config: &MockDmapConfig,
) -> (u16, &'static str, Vec<u8>) {
    let database = rest.strip_suffix("/items").and_then(|id| id.parse::<u32>().ok());
    if database != Some(config.database_id) {
        return (404, "text/plain", b"no such database".to_vec());
    }
    let query = params.get("query").map_or("", String::as_str);
    let rows: Vec<SongRow> = match query
        .trim_matches('\'')
        .strip_prefix("dmap.itemid:")
        .and_then(|id| id.parse::<u32>().ok())
    {
        Some(id) => config
            .songs
            .iter()
            .filter(|s| s.item_id == id)
            .cloned()
            .collect(),
        None => config.songs.clone(),
    };
    (200, "application/x-dmap-tagged", bodies::items(&rows))
}

async fn play_status(params: &HashMap<String, String>, shared: &Shared) -> Vec<u8> {
    let requested = params
        .get("revision-number")
        .and_then(|r| r.parse::<u32>().ok())
        .unwrap_or(1);

    let current = shared.state.read().await.player.revision;
    if requested == current {
        let mut revision = shared.revision.subscribe();
        let mut stopped = shared.stopped.subscribe();
        tokio::select! {
            _ = revision.wait_for(|r| *r != requested) => {}
            _ = stopped.wait_for(|s| *s) => {}
        }
    }

    let player = shared.state.read().await.player.clone();
    encode_play_status(&PlayStatusFields {
        revision: player.revision,
        player_state: Some(player.player_state),
        now_playing: Some([1, 1, 1, player.item_id]),
        title: Some(&player.title),
        artist: Some(&player.artist),
        album: Some(&player.album),
        remaining_ms: Some(player.remaining_ms),
        total_ms: Some(player.total_ms),
    })
}

async fn set_property(
    params: &HashMap<String, String>,
    shared: &Shared,
) -> (u16, &'static str, Vec<u8>) {
    if let Some(volume) = params.get("dmcp.volume").and_then(|v| v.parse::<u8>().ok()) {
        shared.state.write().await.volume = volume;
        return (204, "application/x-dmap-tagged", Vec::new());
    }
    if let Some(rating) = params.get("dacp.userrating").and_then(|v| v.parse::<u8>().ok()) {
        let item = params.get("item-spec").cloned().unwrap_or_default();
        shared.state.write().await.last_rating = Some((rating, item));
        return (204, "application/x-dmap-tagged", Vec::new());
    }
    (400, "text/plain", b"unsupported property".to_vec())
}

async fn apply_command(command: DacpCommand, shared: &Shared) {
    match command {
        DacpCommand::Play | DacpCommand::PlayResume => {
            shared.update_player(|p| p.player_state = 4).await;
        }
        DacpCommand::Pause => shared.update_player(|p| p.player_state = 3).await,
        DacpCommand::Stop => shared.update_player(|p| p.player_state = 2).await,
        DacpCommand::PlayPause => {
            shared
                .update_player(|p| p.player_state = if p.player_state == 4 { 3 } else { 4 })
                .await;
        }
        DacpCommand::NextItem => {
            shared
                .update_player(|p| {
                    p.item_id += 1;
                    p.title = format!("Track {}", p.item_id);
                    p.remaining_ms = p.total_ms;
                })
                .await;
        }
        DacpCommand::PrevItem => {
            shared
                .update_player(|p| {
                    p.item_id = p.item_id.saturating_sub(1);
                    p.title = format!("Track {}", p.item_id);
                    p.remaining_ms = p.total_ms;
                })
                .await;
        }
        DacpCommand::BeginFastForward | DacpCommand::BeginRewind => {}
    }
}

async fn read_request_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buffer.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 || buffer.len() + n > MAX_REQUEST_HEAD {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

async fn respond(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> std::io::Result<()> {
    let reason = match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Error",
    };
    let head = if status == 204 {
        format!("HTTP/1.1 {status} {reason}\r\nConnection: close\r\n\r\n")
    } else {
        format!(
            "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
    };
    stream.write_all(head.as_bytes()).await?;
    if status != 204 {
        stream.write_all(body).await?;
    }
    stream.flush().await?;
    stream.shutdown().await
}
