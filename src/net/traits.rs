//! Transport seam between the session and the network

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::protocol::daap::{DmapDecoder, ResponseTree};
use crate::protocol::dacp::RequestTarget;

/// Something that can carry DACP requests to a server
///
/// [`TransportClient`](super::TransportClient) is the HTTP implementation;
/// tests substitute scripted transports.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Fetch the body of `target`
    ///
    /// `keep_open` lifts the connect and read timeouts. Only long-poll
    /// targets may ask for it.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the request fails or the server
    /// answers with a status of 400 or above.
    async fn fetch(&self, target: &RequestTarget, keep_open: bool) -> Result<Bytes>;

    /// Abort every request in flight and refuse new ones
    fn shutdown_all(&self);

    /// Whether [`shutdown_all`](Self::shutdown_all) has been called
    fn is_shut_down(&self) -> bool;

    /// Raw body with ordinary timeouts
    ///
    /// # Errors
    ///
    /// Same as [`fetch`](Self::fetch).
    async fn send_raw(&self, target: &RequestTarget) -> Result<Bytes> {
        self.fetch(target, false).await
    }

    /// Fetch and decode a DMAP body
    ///
    /// # Errors
    ///
    /// Transport errors as for [`fetch`](Self::fetch); a malformed body
    /// yields `RemoteError::Decode`.
    async fn send(&self, target: &RequestTarget, keep_open: bool) -> Result<ResponseTree> {
        let body = self.fetch(target, keep_open).await?;
        let decoded = DmapDecoder::new().decode_with_diagnostics(&body)?;
        if !decoded.anomalies.is_empty() {
            tracing::debug!(
                target = %target.path(),
                anomalies = decoded.anomalies.len(),
                "response decoded with skipped fields"
            );
        }
        Ok(decoded.tree)
    }
}
