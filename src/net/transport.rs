//! HTTP transport for DACP requests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue};

use super::registry::InFlightRegistry;
use super::traits::RemoteTransport;
use crate::error::{RemoteError, Result};
use crate::protocol::dacp::RequestTarget;
use crate::types::RemoteConfig;

const USER_AGENT: &str = concat!("dacp-remote/", env!("CARGO_PKG_VERSION"));

/// HTTP client for one server
///
/// Holds two connection pools: one with the configured connect and read
/// timeouts, and one without any for the play-status long poll. Every
/// request runs as its own task registered in an in-flight set so
/// [`shutdown_all`](RemoteTransport::shutdown_all) can abort it.
#[derive(Debug, Clone)]
pub struct TransportClient {
    client: reqwest::Client,
    long_poll_client: reqwest::Client,
    request_timeout: Duration,
    in_flight: Arc<InFlightRegistry>,
}

impl TransportClient {
    /// Client using the timeouts from `config`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        Self::with_timeouts(config.request_timeout, config.connect_timeout)
    }

    /// Client with explicit timeouts
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn with_timeouts(request_timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let client = base_builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(build_error)?;
        let long_poll_client = base_builder().build().map_err(build_error)?;

        Ok(Self {
            client,
            long_poll_client,
            request_timeout,
            in_flight: Arc::new(InFlightRegistry::new()),
        })
    }

    /// Number of requests currently in flight
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

fn base_builder() -> reqwest::ClientBuilder {
    let mut headers = HeaderMap::new();
    headers.insert("Viewer-Only-Client", HeaderValue::from_static("1"));
    headers.insert("Client-DAAP-Version", HeaderValue::from_static("3.10"));

    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .gzip(true)
        .deflate(true)
}

fn build_error(e: reqwest::Error) -> RemoteError {
    RemoteError::ConnectionFailed {
        target: String::new(),
        message: format!("HTTP client setup failed: {e}"),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl RemoteTransport for TransportClient {
    async fn fetch(&self, target: &RequestTarget, keep_open: bool) -> Result<Bytes> {
        if keep_open && !target.is_long_poll() {
            return Err(RemoteError::InvalidRequest {
                name: "keep_open".to_string(),
                message: format!("{} is not a long-poll target", target.path()),
            });
        }
        if self.in_flight.is_shut_down() {
            return Err(RemoteError::ShutDown);
        }

        let (client, timeout) = if keep_open {
            (self.long_poll_client.clone(), None)
        } else {
            (self.client.clone(), Some(self.request_timeout))
        };
        let url = target.url();
        let label = target.path().to_string();

        let task = tokio::spawn(execute(client, url, label.clone(), timeout));
        let Some(_guard) = self.in_flight.register(task.abort_handle()) else {
            return Err(RemoteError::ShutDown);
        };

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(RemoteError::ShutDown),
            Err(e) => Err(RemoteError::ConnectionFailed {
                target: label,
                message: format!("request task failed: {e}"),
                source: Some(Box::new(e)),
            }),
        }
    }

    fn shutdown_all(&self) {
        let aborted = self.in_flight.shutdown_all();
        tracing::debug!(aborted, "transport shut down");
    }

    fn is_shut_down(&self) -> bool {
        self.in_flight.is_shut_down()
    }
}

async fn execute(
    client: reqwest::Client,
    url: String,
    target: String,
    timeout: Option<Duration>,
) -> Result<Bytes> {
    tracing::trace!(%target, long_poll = timeout.is_none(), "sending request");

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| request_error(e, &target, timeout))?;

    let status = response.status();
    if status.as_u16() >= 400 {
        let reason = status.canonical_reason().unwrap_or("").to_string();
        let message = match response.text().await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => reason,
        };
        tracing::debug!(%target, status = status.as_u16(), "request rejected");
        return Err(RemoteError::HttpStatus {
            target,
            status: status.as_u16(),
            message,
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| request_error(e, &target, timeout))?;
    tracing::trace!(%target, status = status.as_u16(), len = body.len(), "response received");
    Ok(body)
}

fn request_error(e: reqwest::Error, target: &str, timeout: Option<Duration>) -> RemoteError {
    match timeout {
        Some(duration) if e.is_timeout() => RemoteError::Timeout {
            target: target.to_string(),
            duration,
        },
        _ => RemoteError::ConnectionFailed {
            target: target.to_string(),
            message: e.to_string(),
            source: Some(Box::new(e)),
        },
    }
}
