//! Transport that replays scripted replies without touching the network

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;

use crate::error::{RemoteError, Result};
use crate::net::RemoteTransport;
use crate::protocol::dacp::RequestTarget;

/// One scripted answer
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Answer with this body
    Body(Vec<u8>),
    /// Fail with `RemoteError::Timeout`
    Timeout,
    /// Fail with `RemoteError::HttpStatus`
    Status(u16),
    /// Fail with `RemoteError::ConnectionFailed`
    ConnectionRefused,
    /// Never answer until the transport is shut down
    Hang,
}

/// A request the transport saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Path and query as sent
    pub path_and_query: String,
    /// Whether the caller asked for no timeouts
    pub keep_open: bool,
}

impl RecordedRequest {
    /// Path without the query string
    #[must_use]
    pub fn path(&self) -> &str {
        self.path_and_query
            .split_once('?')
            .map_or(self.path_and_query.as_str(), |(path, _)| path)
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    replies: HashMap<String, VecDeque<ScriptedReply>>,
    log: Vec<RecordedRequest>,
}

/// [`RemoteTransport`] driven by per-path reply queues
///
/// Replies are queued by request path (query excluded) and consumed in
/// order. A request whose queue is empty behaves like [`ScriptedReply::Hang`],
/// which is what an idle long poll looks like.
#[derive(Debug)]
pub struct ScriptedTransport {
    state: Mutex<ScriptState>,
    requests_seen: watch::Sender<usize>,
    shut_down: watch::Sender<bool>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    /// Transport with nothing scripted
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptState::default()),
            requests_seen: watch::Sender::new(0),
            shut_down: watch::Sender::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `reply` for the next request to `path`
    pub fn push(&self, path: &str, reply: ScriptedReply) -> &Self {
        self.lock()
            .replies
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Queue a body for the next request to `path`
    pub fn push_body(&self, path: &str, body: Vec<u8>) -> &Self {
        self.push(path, ScriptedReply::Body(body))
    }

    /// Every request seen so far, in order
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().log.clone()
    }

    /// Requests seen for one path
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.lock()
            .log
            .iter()
            .filter(|r| r.path() == path)
            .cloned()
            .collect()
    }

    /// Replies still queued for `path`
    #[must_use]
    pub fn pending(&self, path: &str) -> usize {
        self.lock().replies.get(path).map_or(0, VecDeque::len)
    }

    /// Wait until at least `count` requests have been made
    pub async fn wait_for_requests(&self, count: usize) {
        let mut rx = self.requests_seen.subscribe();
        let _ = rx.wait_for(|seen| *seen >= count).await;
    }

    async fn hang(&self) -> RemoteError {
        let mut rx = self.shut_down.subscribe();
        let _ = rx.wait_for(|down| *down).await;
        RemoteError::ShutDown
    }
}

#[async_trait]
impl RemoteTransport for ScriptedTransport {
    async fn fetch(&self, target: &RequestTarget, keep_open: bool) -> Result<Bytes> {
        if keep_open && !target.is_long_poll() {
            return Err(RemoteError::InvalidRequest {
                name: "keep_open".to_string(),
                message: format!("{} is not a long-poll target", target.path()),
            });
        }
        if self.is_shut_down() {
            return Err(RemoteError::ShutDown);
        }

        let reply = {
            let mut state = self.lock();
            state.log.push(RecordedRequest {
                path_and_query: target.path_and_query().to_string(),
                keep_open,
            });
            state
                .replies
                .get_mut(target.path())
                .and_then(VecDeque::pop_front)
        };
        self.requests_seen.send_modify(|seen| *seen += 1);

        let label = target.path().to_string();
        match reply {
            Some(ScriptedReply::Body(body)) => Ok(Bytes::from(body)),
            Some(ScriptedReply::Timeout) => Err(RemoteError::Timeout {
                target: label,
                duration: Duration::ZERO,
            }),
            Some(ScriptedReply::Status(status)) => Err(RemoteError::HttpStatus {
                target: label,
                status,
                message: "scripted".to_string(),
            }),
            Some(ScriptedReply::ConnectionRefused) => Err(RemoteError::ConnectionFailed {
                target: label,
                message: "connection refused".to_string(),
                source: None,
            }),
            Some(ScriptedReply::Hang) | None => Err(self.hang().await),
        }
    }

    fn shutdown_all(&self) {
        self.shut_down.send_replace(true);
    }

    fn is_shut_down(&self) -> bool {
        *self.shut_down.borrow()
    }
}
