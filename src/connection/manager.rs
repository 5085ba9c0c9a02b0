//! Session manager for a DACP server

use std::sync::{Arc, PoisonError};

use bytes::Bytes;
use tokio::sync::{Mutex, RwLock, watch};

use super::poll::{PollHandle, PollWorker};
use super::state::SessionState;
use super::status::StatusListener;
use crate::discovery::{TouchRemoteAdvertiser, TouchRemoteRecord};
use crate::error::{RemoteError, Result};
use crate::net::{RemoteTransport, TransportClient};
use crate::protocol::daap::{ResponseTree, codes};
use crate::protocol::dacp::{DacpCommand, RequestEncoder, SearchPredicate};
use crate::protocol::pairing::{
    CredentialStore, PairingCredential, PairingListener, StoredPairing,
};
use crate::types::{LibraryDatabase, RemoteConfig};

/// Login statuses that mean the server does not know the credential
const REJECTED_LOGIN_STATUSES: [u16; 3] = [401, 403, 503];

/// Result of a successful login
#[derive(Debug, Clone)]
pub(crate) struct ActiveLogin {
    pub(crate) credential: PairingCredential,
    pub(crate) session_id: String,
    pub(crate) database: LibraryDatabase,
}

/// State shared between the session handle and its poll worker
pub(crate) struct SessionCore {
    pub(crate) config: RemoteConfig,
    pub(crate) encoder: RequestEncoder,
    pub(crate) transport: Arc<dyn RemoteTransport>,
    state: watch::Sender<SessionState>,
    login: RwLock<Option<ActiveLogin>>,
    listener: std::sync::RwLock<Option<Arc<dyn StatusListener>>>,
}

impl SessionCore {
    pub(crate) fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub(crate) fn set_state(&self, new: SessionState) {
        let old = self.state.send_replace(new);
        if old == new {
            return;
        }
        tracing::info!(%old, %new, server = %self.config.server_id(), "session state changed");

        let listener = self
            .listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            listener.on_state_changed(old, new);
        }
    }

    fn set_listener(&self, listener: Arc<dyn StatusListener>) {
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    pub(crate) async fn credential(&self) -> Option<PairingCredential> {
        self.login.read().await.as_ref().map(|l| l.credential)
    }

    pub(crate) async fn session_id(&self) -> Option<String> {
        self.login.read().await.as_ref().map(|l| l.session_id.clone())
    }

    async fn require_login(&self) -> Result<ActiveLogin> {
        self.login
            .read()
            .await
            .clone()
            .ok_or_else(|| RemoteError::InvalidState {
                message: "not logged in".to_string(),
                current_state: self.state().to_string(),
            })
    }

    /// Log in and look up the main library
    ///
    /// Does not touch the session state; callers decide what a failure means.
    pub(crate) async fn establish(&self, credential: PairingCredential) -> Result<()> {
        let login = match self
            .transport
            .send(&self.encoder.login(credential), false)
            .await
        {
            Err(RemoteError::HttpStatus { status, .. })
                if REJECTED_LOGIN_STATUSES.contains(&status) =>
            {
                return Err(RemoteError::PairingRejected {
                    server: self.config.server_id(),
                    status,
                });
            }
            other => other?,
        };

        let session_id = login
            .get_unsigned(&[codes::MLOG, codes::MLID])
            .ok_or_else(|| RemoteError::ProtocolState {
                message: "login response has no session id".to_string(),
            })?
            .to_string();

        let listing = self
            .transport
            .send(&self.encoder.databases(&session_id), false)
            .await?;
        let database =
            LibraryDatabase::primary(&listing).ok_or_else(|| RemoteError::ProtocolState {
                message: "server listed no databases".to_string(),
            })?;

        tracing::debug!(
            session_id = %session_id,
            database = database.id,
            "logged in"
        );
        *self.login.write().await = Some(ActiveLogin {
            credential,
            session_id,
            database,
        });
        Ok(())
    }

    async fn clear_login(&self) -> Option<ActiveLogin> {
        self.login.write().await.take()
    }
}

/// Remote control session for one DACP server
///
/// Owns the login, the credential store and the status poll worker.
/// Commands and queries can be issued from any task while polling runs.
pub struct RemoteSession {
    core: Arc<SessionCore>,
    store: Mutex<Box<dyn CredentialStore>>,
    poller: Mutex<Option<PollHandle>>,
}

impl RemoteSession {
    /// Create a session over an existing transport
    #[must_use]
    pub fn new(
        config: RemoteConfig,
        transport: Arc<dyn RemoteTransport>,
        store: Box<dyn CredentialStore>,
    ) -> Self {
        let encoder = RequestEncoder::new(config.host.clone(), config.port);
        let (state, _) = watch::channel(SessionState::Unpaired);

        Self {
            core: Arc::new(SessionCore {
                config,
                encoder,
                transport,
                state,
                login: RwLock::new(None),
                listener: std::sync::RwLock::new(None),
            }),
            store: Mutex::new(store),
            poller: Mutex::new(None),
        }
    }

    /// Create a session talking HTTP to `config.host:config.port`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn with_http(config: RemoteConfig, store: Box<dyn CredentialStore>) -> Result<Self> {
        let transport = Arc::new(TransportClient::new(&config)?);
        Ok(Self::new(config, transport, store))
    }

    /// Session configuration
    #[must_use]
    pub fn config(&self) -> &RemoteConfig {
        &self.core.config
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.core.state()
    }

    /// Watch state transitions
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.core.state.subscribe()
    }

    /// Session id of the current login
    pub async fn session_id(&self) -> Option<String> {
        self.core.session_id().await
    }

    /// Main library of the current login
    pub async fn database(&self) -> Option<LibraryDatabase> {
        self.core
            .login
            .read()
            .await
            .as_ref()
            .map(|l| l.database.clone())
    }

    /// Query `/server-info`; needs no login
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn server_info(&self) -> Result<ResponseTree> {
        self.core
            .transport
            .send(&self.core.encoder.server_info(), false)
            .await
    }

    // ===== Pairing and login =====

    /// Log in with the stored credential for this server
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::PairingRequired` if nothing is stored,
    /// `RemoteError::PairingRejected` if the server refuses the credential,
    /// or the transport error that stopped the login.
    pub async fn connect(&self) -> Result<()> {
        self.ensure_not_active()?;
        let server = self.core.config.server_id();
        let stored = self.store.lock().await.load(&server).await;

        let Some(stored) = stored else {
            self.core.set_state(SessionState::Unpaired);
            return Err(RemoteError::PairingRequired { server });
        };
        self.login(stored.credential).await
    }

    /// Log in with an explicit credential
    ///
    /// # Errors
    ///
    /// As for [`connect`](Self::connect), minus the missing-credential case.
    pub async fn login(&self, credential: PairingCredential) -> Result<()> {
        self.ensure_not_active()?;
        self.core.set_state(SessionState::PairedConnecting);

        match self.core.establish(credential).await {
            Ok(()) => {
                self.core.set_state(SessionState::Active);
                Ok(())
            }
            Err(e) => {
                let next = if e.needs_pairing() {
                    SessionState::Unpaired
                } else {
                    SessionState::Disconnected
                };
                tracing::warn!(error = %e, "login failed");
                self.core.set_state(next);
                Err(e)
            }
        }
    }

    /// Advertise this remote, wait for the server to pair, then log in
    ///
    /// The `_touch-remote._tcp` record stays registered until the server
    /// connects or `pairing_timeout` runs out.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::InvalidState` if the session is already active
    /// or connecting, error if the listener or the advertisement cannot be set up,
    /// `RemoteError::PairingTimeout` if no server connects in time, or any
    /// error from storing the credential or logging in.
    pub async fn pair(&self) -> Result<PairingCredential> {
        self.ensure_not_active()?;
        let listener = PairingListener::bind(self.core.config.pairing_port).await?;
        let record = TouchRemoteRecord {
            display_name: self.core.config.display_name.clone(),
            pair_token: rand::random(),
            port: listener.port(),
        };
        let mut advertiser = TouchRemoteAdvertiser::new(record)?;
        advertiser.register()?;

        let result = self.accept_pairing(listener).await;
        if let Err(e) = advertiser.unregister() {
            tracing::debug!(error = %e, "pairing record already gone");
        }
        let credential = result?;

        self.login(credential).await?;
        Ok(credential)
    }

    /// Wait on a bound listener for the server's pairing request, then log in
    ///
    /// Nothing is advertised; use this when the server already knows where
    /// to find the listener.
    ///
    /// # Errors
    ///
    /// As for [`pair`](Self::pair), minus advertisement errors.
    pub async fn pair_with_listener(&self, listener: PairingListener) -> Result<PairingCredential> {
        let credential = self.accept_pairing(listener).await?;
        self.login(credential).await?;
        Ok(credential)
    }

    async fn accept_pairing(&self, listener: PairingListener) -> Result<PairingCredential> {
        self.ensure_not_active()?;
        let credential = PairingCredential::generate();
        let timeout = self.core.config.pairing_timeout;
        tracing::info!(port = listener.port(), "waiting for pairing request");

        let mut task = listener.spawn(credential);
        let request = match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => {
                return Err(RemoteError::ProtocolState {
                    message: format!("pairing listener failed: {e}"),
                });
            }
            Err(_) => {
                task.abort();
                return Err(RemoteError::PairingTimeout { duration: timeout });
            }
        };

        let pairing = StoredPairing {
            credential,
            service_name: request.service_name,
        };
        self.store
            .lock()
            .await
            .save(&self.core.config.server_id(), &pairing)
            .await?;
        Ok(credential)
    }

    /// Forget the stored credential for this server
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be updated.
    pub async fn forget_pairing(&self) -> Result<()> {
        self.store
            .lock()
            .await
            .remove(&self.core.config.server_id())
            .await?;
        Ok(())
    }

    fn ensure_not_active(&self) -> Result<()> {
        let current = self.core.state();
        if current.is_active() || current.is_connecting() {
            return Err(RemoteError::InvalidState {
                message: "already connected or connecting".to_string(),
                current_state: current.to_string(),
            });
        }
        Ok(())
    }

    // ===== Status polling =====

    /// Start the status poll worker
    ///
    /// Every decoded status response goes to `listener` together with the
    /// previous snapshot and the diff between the two.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::InvalidState` unless the session is active and
    /// not already polling.
    pub async fn start_polling(&self, listener: Arc<dyn StatusListener>) -> Result<()> {
        let mut poller = self.poller.lock().await;
        if poller.as_ref().is_some_and(|p| !p.is_finished()) {
            return Err(RemoteError::InvalidState {
                message: "status polling already running".to_string(),
                current_state: self.state().to_string(),
            });
        }
        if !self.state().is_active() {
            return Err(RemoteError::InvalidState {
                message: "status polling needs an active session".to_string(),
                current_state: self.state().to_string(),
            });
        }

        self.core.set_listener(Arc::clone(&listener));
        *poller = Some(PollWorker::spawn(Arc::clone(&self.core), listener));
        Ok(())
    }

    /// Stop the status poll worker and wait for it to exit
    pub async fn stop_polling(&self) {
        let handle = self.poller.lock().await.take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    /// Whether the poll worker is running
    pub async fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .await
            .as_ref()
            .is_some_and(|p| !p.is_finished())
    }

    /// Fetch the play status now, without waiting for a change
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the request fails.
    pub async fn refresh_status(&self) -> Result<ResponseTree> {
        let login = self.core.require_login().await?;
        self.core
            .transport
            .send(
                &self.core.encoder.play_status_refresh(&login.session_id),
                false,
            )
            .await
    }

    // ===== Commands =====

    /// Send a transport command
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the request fails.
    pub async fn command(&self, command: DacpCommand) -> Result<()> {
        let login = self.core.require_login().await?;
        tracing::debug!(%command, "sending command");
        self.core
            .transport
            .send_raw(&self.core.encoder.command(command, &login.session_id))
            .await?;
        Ok(())
    }

    /// Toggle play/pause
    ///
    /// # Errors
    ///
    /// See [`command`](Self::command).
    pub async fn play_pause(&self) -> Result<()> {
        self.command(DacpCommand::PlayPause).await
    }

    /// Skip to the next item
    ///
    /// # Errors
    ///
    /// See [`command`](Self::command).
    pub async fn next_item(&self) -> Result<()> {
        self.command(DacpCommand::NextItem).await
    }

    /// Go back to the previous item
    ///
    /// # Errors
    ///
    /// See [`command`](Self::command).
    pub async fn prev_item(&self) -> Result<()> {
        self.command(DacpCommand::PrevItem).await
    }

    /// Rate an item of the main library, 0..=100
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::InvalidRequest` for ratings above 100 or error
    /// if not logged in or the request fails.
    pub async fn set_rating(&self, item_id: u64, rating: u8) -> Result<()> {
        let login = self.core.require_login().await?;
        let target = self.core.encoder.set_rating(
            rating,
            login.database.persistent_id,
            item_id,
            &login.session_id,
        )?;
        self.core.transport.send_raw(&target).await?;
        Ok(())
    }

    /// Current volume, 0..=100
    ///
    /// # Errors
    ///
    /// Returns error if not logged in, the request fails or the response
    /// has no volume.
    pub async fn volume(&self) -> Result<u8> {
        let login = self.core.require_login().await?;
        let tree = self
            .core
            .transport
            .send(&self.core.encoder.volume(&login.session_id), false)
            .await?;
        tree.get_unsigned(&[codes::CMGT, codes::CMVO])
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| RemoteError::ProtocolState {
                message: "volume response has no dmcp.volume".to_string(),
            })
    }

    /// Set volume, 0..=100
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::InvalidRequest` for levels above 100 or error
    /// if not logged in or the request fails.
    pub async fn set_volume(&self, level: u8) -> Result<()> {
        let login = self.core.require_login().await?;
        let target = self.core.encoder.set_volume(level, &login.session_id)?;
        self.core.transport.send_raw(&target).await?;
        Ok(())
    }

    // ===== Library queries =====

    /// Metadata of one item, with the configured fields
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the request fails.
    pub async fn item_metadata(&self, item_id: u64) -> Result<Option<ResponseTree>> {
        let login = self.core.require_login().await?;
        let target = self.core.encoder.item_metadata(
            login.database.id,
            item_id,
            &self.core.config.item_meta_fields(),
            &login.session_id,
        );
        let tree = self.core.transport.send(&target, false).await?;
        Ok(listing_items(&tree).into_iter().next())
    }

    /// Items matching every predicate
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the request fails.
    pub async fn search(&self, predicates: &[SearchPredicate]) -> Result<Vec<ResponseTree>> {
        let login = self.core.require_login().await?;
        let target = self.core.encoder.search(
            login.database.id,
            predicates,
            &self.core.config.item_meta_fields(),
            &login.session_id,
        );
        let tree = self.core.transport.send(&target, false).await?;
        Ok(listing_items(&tree))
    }

    /// Artwork of the playing item at the configured size
    ///
    /// # Errors
    ///
    /// Returns error if not logged in or the request fails.
    pub async fn now_playing_artwork(&self) -> Result<Bytes> {
        let login = self.core.require_login().await?;
        let size = self.core.config.artwork_size;
        self.core
            .transport
            .send_raw(
                &self
                    .core
                    .encoder
                    .now_playing_artwork(size, size, &login.session_id),
            )
            .await
    }

    // ===== Teardown =====

    /// Stop polling, end the server session and go to `Stopped`
    ///
    /// # Errors
    ///
    /// Returns error if the logout request fails; the session is stopped
    /// either way.
    pub async fn logout(&self) -> Result<()> {
        self.stop_polling().await;
        let login = self.core.clear_login().await;
        self.core.set_state(SessionState::Stopped);

        match login {
            Some(login) => {
                self.core
                    .transport
                    .send_raw(&self.core.encoder.logout(&login.session_id))
                    .await?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Abort every request in flight and stop polling
    ///
    /// The transport refuses further requests afterwards.
    pub async fn shutdown(&self) {
        self.core.transport.shutdown_all();
        self.stop_polling().await;
        self.core.clear_login().await;
        self.core.set_state(SessionState::Stopped);
    }
}

/// `mlit` items of an `adbs` listing
fn listing_items(tree: &ResponseTree) -> Vec<ResponseTree> {
    tree.get_multi_branch(&[codes::ADBS, codes::MLCL, codes::MLIT])
        .to_vec()
}
