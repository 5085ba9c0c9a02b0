//! Play-status long-poll worker

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::manager::SessionCore;
use super::state::SessionState;
use super::status::{StatusListener, StatusUpdate, classify};
use crate::error::{RemoteError, Result};
use crate::protocol::daap::{ResponseTree, codes, diff};
use crate::protocol::dacp::{REFRESH_REVISION, RequestTarget};

/// Handle to a running poll worker
#[derive(Debug)]
pub(crate) struct PollHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Signal the worker and wait for it to exit
    pub(crate) async fn stop(self) {
        self.shutdown.send_replace(true);
        match self.task.await {
            Err(e) if e.is_panic() => tracing::error!(error = %e, "poll worker panicked"),
            _ => {}
        }
    }

    /// Whether the worker has exited
    #[must_use]
    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

enum Step {
    Continue,
    Exit,
}

/// Sole owner of the revision and the last snapshot
pub(crate) struct PollWorker {
    core: Arc<SessionCore>,
    listener: Arc<dyn StatusListener>,
    shutdown: watch::Receiver<bool>,
    revision: u32,
    snapshot: Arc<ResponseTree>,
}

impl PollWorker {
    pub(crate) fn spawn(core: Arc<SessionCore>, listener: Arc<dyn StatusListener>) -> PollHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = Self {
            core,
            listener,
            shutdown: shutdown_rx,
            revision: REFRESH_REVISION,
            snapshot: Arc::new(ResponseTree::new()),
        };
        PollHandle {
            shutdown: shutdown_tx,
            task: tokio::spawn(worker.run()),
        }
    }

    async fn run(mut self) {
        tracing::debug!("status poll worker started");
        loop {
            let Some(session_id) = self.core.session_id().await else {
                break;
            };

            let target = self.core.encoder.play_status(self.revision, &session_id);
            let step = match self.request(&target, true).await {
                None => Step::Exit,
                Some(Ok(tree)) => {
                    self.handle_status(tree);
                    Step::Continue
                }
                Some(Err(e)) if e.is_timeout() => self.refresh(&session_id).await,
                Some(Err(e)) => self.recover(e).await,
            };
            if matches!(step, Step::Exit) {
                break;
            }
        }
        tracing::debug!(revision = self.revision, "status poll worker stopped");
    }

    /// Send `target` unless the worker is told to stop first
    async fn request(
        &mut self,
        target: &RequestTarget,
        keep_open: bool,
    ) -> Option<Result<ResponseTree>> {
        if *self.shutdown.borrow() {
            return None;
        }
        tokio::select! {
            result = self.core.transport.send(target, keep_open) => Some(result),
            _ = self.shutdown.wait_for(|stop| *stop) => None,
        }
    }

    /// One immediate status request after a long-poll timeout
    async fn refresh(&mut self, session_id: &str) -> Step {
        tracing::debug!(revision = self.revision, "status poll timed out, refreshing");
        let target = self.core.encoder.play_status_refresh(session_id);
        match self.request(&target, false).await {
            None => Step::Exit,
            Some(Ok(tree)) => {
                self.handle_status(tree);
                Step::Continue
            }
            Some(Err(e)) => self.recover(e).await,
        }
    }

    fn handle_status(&mut self, tree: ResponseTree) {
        match tree
            .get_unsigned(&[codes::CMST, codes::CMSR])
            .and_then(|r| u32::try_from(r).ok())
        {
            Some(revision) => self.revision = revision,
            None => tracing::warn!(revision = self.revision, "status response has no revision"),
        }

        if self.core.config.debug_protocol {
            tracing::debug!(revision = self.revision, "status:\n{}", tree.dump());
        }

        let current = Arc::new(tree);
        let changes = diff(&self.snapshot, &current);
        let classification = classify(&changes);
        let previous = std::mem::replace(&mut self.snapshot, Arc::clone(&current));

        tracing::trace!(revision = self.revision, ?classification, "status update");
        self.listener.on_status(StatusUpdate {
            previous,
            current,
            diff: changes,
            classification,
            revision: self.revision,
        });
    }

    /// Log in again after a failed poll
    async fn recover(&mut self, error: RemoteError) -> Step {
        if matches!(error, RemoteError::ShutDown) || *self.shutdown.borrow() {
            return Step::Exit;
        }
        tracing::warn!(error = %error, "status poll failed");

        let Some(credential) = self.core.credential().await else {
            return Step::Exit;
        };
        self.core.set_state(SessionState::Reconnecting);

        let attempts = self.core.config.reconnect_attempts;
        let delay = self.core.config.reconnect_delay;
        for attempt in 1..=attempts {
            let stopped = tokio::select! {
                () = tokio::time::sleep(delay) => false,
                _ = self.shutdown.wait_for(|stop| *stop) => true,
            };
            if stopped {
                return self.abandon_reconnect();
            }

            let core = Arc::clone(&self.core);
            let result = tokio::select! {
                result = core.establish(credential) => Some(result),
                _ = self.shutdown.wait_for(|stop| *stop) => None,
            };
            let Some(result) = result else {
                return self.abandon_reconnect();
            };
            match result {
                Ok(()) => {
                    tracing::info!(attempt, "reconnected");
                    self.revision = REFRESH_REVISION;
                    self.core.set_state(SessionState::Active);
                    return Step::Continue;
                }
                Err(e) if e.needs_pairing() => {
                    tracing::warn!(error = %e, "credential rejected while reconnecting");
                    self.core.set_state(SessionState::Unpaired);
                    return Step::Exit;
                }
                Err(RemoteError::ShutDown) => return self.abandon_reconnect(),
                Err(e) => {
                    tracing::warn!(attempt, attempts, error = %e, "reconnect attempt failed");
                }
            }
        }

        self.core.set_state(SessionState::Disconnected);
        Step::Exit
    }

    /// Stopped mid-reconnect; the session is no longer logged in
    fn abandon_reconnect(&self) -> Step {
        tracing::debug!("reconnect abandoned");
        self.core.set_state(SessionState::Disconnected);
        Step::Exit
    }
}
