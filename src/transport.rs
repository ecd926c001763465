//! The byte-stream contract the protocol core runs over.
//!
//! [`Transport`] is the only thing the core knows about sockets: ordered
//! whole-buffer sends, receives that may return fewer bytes than asked for,
//! and idempotent disconnect. [`TcpTransport`] is the plain-TCP
//! implementation; an encrypted transport plugs in the same way with its
//! certificate policy handled by [`crate::client::trust`].

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpSocket, TcpStream};

use crate::bolt::error::{BoltError, BoltResult};

/// Abstract ordered byte stream used by the connection and handshake.
///
/// Implementations report end-of-stream as a [`BoltError::Connection`];
/// a zero-length receive is tolerated by callers but treated as closed.
#[allow(async_fn_in_trait)]
pub trait Transport: Send {
    /// Establish the underlying stream within `timeout`.
    async fn connect(&mut self, timeout: Duration) -> BoltResult<()>;

    /// Send the whole buffer, preserving order with previous sends.
    async fn send(&mut self, bytes: &[u8]) -> BoltResult<()>;

    /// Receive up to `max` bytes; may return fewer.
    async fn receive(&mut self, max: usize) -> BoltResult<Vec<u8>>;

    /// Tear the stream down. Safe to call repeatedly.
    async fn disconnect(&mut self);
}

/// Plain TCP transport backed by tokio.
pub struct TcpTransport {
    host: String,
    port: u16,
    keep_alive: bool,
    socket_timeout: Option<Duration>,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Create a transport for `host:port`. Nothing is opened until
    /// [`Transport::connect`].
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            keep_alive: false,
            socket_timeout: None,
            stream: None,
        }
    }

    /// Enable TCP keep-alive on the socket.
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Fail reads and writes that stall longer than `timeout`. `None`
    /// disables the inactivity budget.
    pub fn with_socket_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.socket_timeout = timeout;
        self
    }

    /// The configured remote address as `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn stream_mut(&mut self) -> BoltResult<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| BoltError::Connection("transport is not connected".to_string()))
    }

    async fn guarded<F, O>(timeout: Option<Duration>, what: &str, fut: F) -> BoltResult<O>
    where
        F: std::future::Future<Output = std::io::Result<O>>,
    {
        let result = match timeout {
            Some(budget) => tokio::time::timeout(budget, fut)
                .await
                .map_err(|_| BoltError::Connection(format!("{what} timed out")))?,
            None => fut.await,
        };
        result.map_err(|e| BoltError::Connection(format!("{what} failed: {e}")))
    }
}

impl Transport for TcpTransport {
    async fn connect(&mut self, timeout: Duration) -> BoltResult<()> {
        if self.stream.is_some() {
            return Err(BoltError::Connection(
                "transport is already connected".to_string(),
            ));
        }

        let address = self.address();
        let connect = async {
            let mut last_err = None;
            for addr in lookup_host(&address).await? {
                let socket = if addr.is_ipv4() {
                    TcpSocket::new_v4()?
                } else {
                    TcpSocket::new_v6()?
                };
                socket.set_keepalive(self.keep_alive)?;
                match socket.connect(addr).await {
                    Ok(stream) => return Ok(stream),
                    Err(e) => last_err = Some(e),
                }
            }
            Err(last_err.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
            }))
        };

        let stream = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| BoltError::Connection(format!("connect to {address} timed out")))?
            .map_err(|e| BoltError::Connection(format!("failed to connect to {address}: {e}")))?;

        stream.set_nodelay(true).ok();
        tracing::debug!(address = %address, "transport connected");
        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> BoltResult<()> {
        let timeout = self.socket_timeout;
        let stream = self.stream_mut()?;
        Self::guarded(timeout, "send", async {
            stream.write_all(bytes).await?;
            stream.flush().await
        })
        .await
    }

    async fn receive(&mut self, max: usize) -> BoltResult<Vec<u8>> {
        let timeout = self.socket_timeout;
        let stream = self.stream_mut()?;
        let mut buf = vec![0u8; max];
        let n = Self::guarded(timeout, "receive", stream.read(&mut buf)).await?;
        if n == 0 {
            return Err(BoltError::Connection(
                "connection closed by server".to_string(),
            ));
        }
        buf.truncate(n);
        Ok(buf)
    }

    async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            tracing::debug!(address = %self.address(), "transport disconnected");
        }
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("address", &self.address())
            .field("connected", &self.stream.is_some())
            .finish()
    }
}
