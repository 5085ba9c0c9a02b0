//! One-shot HTTP listener answering a server's `/pair` request

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};

use super::ack::pairing_ack;
use super::credential::PairingCredential;
use crate::error::RemoteError;

/// Largest request head accepted before the connection is dropped
const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// How long one connection may take to send its request and read the answer
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// What the server sent when it asked to pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingRequest {
    /// Address the request came from
    pub peer: SocketAddr,
    /// `pairingcode` query parameter
    pub pairing_code: Option<String>,
    /// `servicename` query parameter, the server's library id
    pub service_name: Option<String>,
}

/// Listening socket for the pairing handshake
#[derive(Debug)]
pub struct PairingListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl PairingListener {
    /// Listen on all interfaces; port 0 picks an ephemeral port
    ///
    /// # Errors
    ///
    /// Returns error if the socket cannot be bound.
    pub async fn bind(port: u16) -> std::io::Result<Self> {
        Self::bind_addr(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await
    }

    /// Listen on a specific address
    ///
    /// # Errors
    ///
    /// Returns error if the socket cannot be bound.
    pub async fn bind_addr(addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Bound address
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Bound port, for the advertisement
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Wait for a `/pair` request and answer it with `credential`
    ///
    /// Each connection is served on its own task under
    /// `CONNECTION_TIMEOUT`; an idle client does not block the others.
    /// Connections for other paths get a 404 and the wait continues.
    ///
    /// # Errors
    ///
    /// Returns error if accepting on the socket fails.
    pub async fn accept_pairing(
        self,
        credential: PairingCredential,
    ) -> Result<PairingRequest, RemoteError> {
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    connections.spawn(async move {
                        let served = tokio::time::timeout(
                            CONNECTION_TIMEOUT,
                            handle_connection(stream, peer, credential),
                        )
                        .await;
                        (peer, served)
                    });
                }
                Some(joined) = connections.join_next() => {
                    match joined {
                        Ok((peer, Ok(Ok(Some(request))))) => {
                            tracing::info!(
                                %peer,
                                service_name = request.service_name.as_deref().unwrap_or(""),
                                "pairing request answered"
                            );
                            return Ok(request);
                        }
                        Ok((_, Ok(Ok(None)))) => {}
                        Ok((peer, Ok(Err(e)))) => {
                            tracing::warn!(%peer, error = %e, "pairing connection failed");
                        }
                        Ok((peer, Err(_))) => {
                            tracing::debug!(%peer, "pairing connection timed out");
                        }
                        Err(e) => tracing::warn!(error = %e, "pairing connection task failed"),
                    }
                }
            }
        }
    }

    /// Run [`accept_pairing`](Self::accept_pairing) on its own task
    #[must_use]
    pub fn spawn(
        self,
        credential: PairingCredential,
    ) -> JoinHandle<Result<PairingRequest, RemoteError>> {
        tokio::spawn(self.accept_pairing(credential))
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    credential: PairingCredential,
) -> std::io::Result<Option<PairingRequest>> {
    let head = read_request_head(&mut stream).await?;

    let Some(target) = request_target(&head) else {
        respond(&mut stream, "400 Bad Request", &[]).await?;
        return Ok(None);
    };
    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    if path != "/pair" {
        tracing::debug!(%peer, path, "ignoring request on pairing listener");
        respond(&mut stream, "404 Not Found", &[]).await?;
        return Ok(None);
    }

    let mut params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    respond(&mut stream, "200 OK", &pairing_ack(credential)).await?;

    Ok(Some(PairingRequest {
        peer,
        pairing_code: params.remove("pairingcode"),
        service_name: params.remove("servicename"),
    }))
}

async fn read_request_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            buf.truncate(end);
            break;
        }
        if buf.len() > MAX_REQUEST_HEAD {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "request head too large",
            ));
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Err(std::io::ErrorKind::UnexpectedEof.into());
            }
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Target of a `GET` request line
fn request_target(head: &str) -> Option<&str> {
    let line = head.lines().next()?;
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Some(target),
        _ => None,
    }
}

async fn respond(stream: &mut TcpStream, status: &str, body: &[u8]) -> std::io::Result<()> {
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.shutdown().await
}
