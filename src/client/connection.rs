//! The Bolt connection state machine.
//!
//! A [`Connection`] owns one transport and drives the whole session over it:
//! handshake, authentication, statement execution, streaming, transactions,
//! routing requests and teardown. All operations are serialised on the
//! connection; requests may be pipelined, and a FIFO registry pairs every
//! response with the request that caused it, in send order.
//!
//! State progression:
//!
//! ```text
//! Idle -> Handshaking -> Authenticating -> Ready <-> Streaming -> Closed
//!                                            \------ Failed ------/
//! ```
//!
//! Any FAILURE response parks the connection in `Failed`; only a successful
//! RESET returns it to `Ready`. `Closed` is terminal.

use std::collections::{HashMap, VecDeque};

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::bolt::chunk::ChunkCodec;
use crate::bolt::error::{BoltError, BoltResult};
use crate::bolt::handshake;
use crate::bolt::message::{
    DiscardMessage, HelloMessage, LogonMessage, PullMessage, Record, Request, Response,
    RouteMessage, RoutingTable, RunMessage, Success, TxOptions,
};
use crate::bolt::packstream::encoder::encode_structure;
use crate::bolt::packstream::Value;
use crate::bolt::version::{BoltCapabilities, BoltVersion};
use crate::transport::{TcpTransport, Transport};

use super::settings::{ConnectionMetadata, ConnectionSettings};

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, transport not opened.
    Idle,
    /// Version negotiation in flight.
    Handshaking,
    /// HELLO/LOGON exchange in flight.
    Authenticating,
    /// Authenticated and between operations.
    Ready,
    /// At least one result stream is open server-side.
    Streaming,
    /// A FAILURE was received; only RESET (or close) leaves this state.
    Failed,
    /// Torn down. Terminal.
    Closed,
}

/// Records and final summary from one PULL batch.
#[derive(Debug)]
pub struct StreamBatch {
    /// Records received before the summary.
    pub records: Vec<Record>,
    /// The closing SUCCESS of the batch.
    pub summary: Success,
    /// Whether the server paused the stream awaiting another PULL/DISCARD.
    pub has_more: bool,
}

/// A live Bolt session over one transport.
pub struct Connection<T: Transport> {
    settings: ConnectionSettings,
    transport: T,
    chunker: ChunkCodec,
    inbound: BytesMut,
    state: ConnectionState,
    capabilities: BoltCapabilities,
    metadata: Option<ConnectionMetadata>,
    bookmark: Option<String>,
    pending: VecDeque<&'static str>,
    in_transaction: bool,
    open_streams: usize,
    connected: bool,
}

impl Connection<TcpTransport> {
    /// Create a connection over plain TCP, configured from `settings`.
    pub fn tcp(host: impl Into<String>, port: u16, settings: ConnectionSettings) -> Self {
        let transport = TcpTransport::new(host, port)
            .with_keep_alive(settings.keep_alive)
            .with_socket_timeout(settings.socket_timeout());
        Self::new(settings, transport)
    }
}

impl<T: Transport> Connection<T> {
    /// Create a connection over an arbitrary transport.
    pub fn new(settings: ConnectionSettings, transport: T) -> Self {
        Self {
            settings,
            transport,
            chunker: ChunkCodec::new(),
            inbound: BytesMut::with_capacity(8192),
            state: ConnectionState::Idle,
            capabilities: BoltVersion::UNINITIALIZED.capabilities(),
            metadata: None,
            bookmark: None,
            pending: VecDeque::new(),
            in_transaction: false,
            open_streams: 0,
            connected: false,
        }
    }

    /// Open the session: connect, negotiate a version, authenticate.
    ///
    /// On Bolt 5.1+ credentials travel in a LOGON after the HELLO; earlier
    /// versions authenticate in the HELLO itself.
    pub async fn open(&mut self) -> BoltResult<()> {
        if self.state != ConnectionState::Idle {
            return Err(BoltError::Protocol(format!(
                "cannot open a connection in state {:?}",
                self.state
            )));
        }

        self.transport
            .connect(self.settings.connection_timeout())
            .await?;

        self.state = ConnectionState::Handshaking;
        let version = match handshake::negotiate(&mut self.transport).await {
            Ok(version) => version,
            Err(e) => {
                self.transport.disconnect().await;
                self.state = ConnectionState::Closed;
                return Err(e);
            }
        };
        self.settings = self.settings.with_version(version);
        self.capabilities = version.capabilities();

        self.state = ConnectionState::Authenticating;
        match self.authenticate().await {
            Ok(success) => {
                self.metadata = Some(ConnectionMetadata::from_success(&success));
                self.state = ConnectionState::Ready;
                self.connected = true;
                tracing::debug!(
                    %version,
                    server = self.metadata.as_ref().map(|m| m.server_agent.as_str()),
                    "connection ready"
                );
                Ok(())
            }
            Err(e) => {
                self.transport.disconnect().await;
                self.state = ConnectionState::Closed;
                self.connected = false;
                Err(e)
            }
        }
    }

    async fn authenticate(&mut self) -> BoltResult<Success> {
        let reauth = self.capabilities.reauth;
        let hello = HelloMessage {
            user_agent: self.settings.user_agent.clone(),
            principal: Some(self.settings.username.clone()),
            credentials: Some(self.settings.password.clone()),
            routing: None,
            notifications_minimum_severity: self.settings.notifications_minimum_severity.clone(),
            notifications_disabled_categories: self
                .settings
                .notifications_disabled_categories
                .clone(),
        };

        self.send(Request::Hello(hello)).await?;
        let hello_success = Self::expect_success(self.recv().await?)?;

        if !reauth {
            return Ok(hello_success);
        }

        self.send(Request::Logon(LogonMessage {
            principal: self.settings.username.clone(),
            credentials: self.settings.password.clone(),
        }))
        .await?;
        let logon_success = Self::expect_success(self.recv().await?)?;

        // The server agent arrives on the HELLO; LOGON may add to it.
        if logon_success.server().is_some() {
            Ok(logon_success)
        } else {
            Ok(hello_success)
        }
    }

    /// Send one request without waiting for its response.
    ///
    /// Requests sent back to back stay in order; pair each with a later
    /// [`recv`](Self::recv). The high-level operations below do this pairing
    /// themselves.
    pub async fn send(&mut self, request: Request) -> BoltResult<()> {
        let name = request.name();
        let structure = request.to_structure(self.settings.version);

        let mut payload = BytesMut::with_capacity(256);
        encode_structure(&mut payload, &structure)?;

        let mut framed = BytesMut::with_capacity(payload.len() + 8);
        self.chunker.write_message(&payload, &mut framed);

        if let Err(e) = self.transport.send(&framed).await {
            self.mark_broken();
            return Err(e);
        }
        self.pending.push_back(name);
        tracing::trace!(message = name, bytes = framed.len(), "sent request");
        Ok(())
    }

    /// Receive the next response, in request order.
    ///
    /// Tracks bookmarks from SUCCESS metadata and parks the connection in
    /// `Failed` when a FAILURE arrives. RECORDs do not consume the pending
    /// request; its closing summary does.
    pub async fn recv(&mut self) -> BoltResult<Response> {
        loop {
            match self.chunker.decode(&mut self.inbound) {
                Ok(Some(payload)) => {
                    let response = match Response::from_bytes(&payload) {
                        Ok(response) => response,
                        Err(e) => {
                            self.mark_broken();
                            return Err(e);
                        }
                    };
                    let request = match &response {
                        Response::Record(_) => self.pending.front().copied(),
                        _ => self.pending.pop_front(),
                    };
                    tracing::trace!(
                        message = response.name(),
                        request = request.unwrap_or("?"),
                        "received response"
                    );
                    match &response {
                        Response::Success(success) => self.track_bookmark(success),
                        Response::Failure(failure) => {
                            tracing::debug!(code = %failure.code, "server failure");
                            self.state = ConnectionState::Failed;
                        }
                        _ => {}
                    }
                    return Ok(response);
                }
                Ok(None) => {}
                Err(e) => {
                    self.mark_broken();
                    return Err(e);
                }
            }

            let bytes = match self.transport.receive(8192).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.mark_broken();
                    return Err(e);
                }
            };
            if bytes.is_empty() {
                self.mark_broken();
                return Err(BoltError::Connection(
                    "connection closed by server".to_string(),
                ));
            }
            self.inbound.extend_from_slice(&bytes);
        }
    }

    /// Execute a statement. Outside an explicit transaction this is an
    /// auto-commit run; the tracked bookmark and the settings' default
    /// database are injected when the caller supplied none.
    ///
    /// Returns the RUN summary (`fields`, `qid`); follow with
    /// [`pull`](Self::pull) or [`discard`](Self::discard) to consume the
    /// stream.
    pub async fn run(
        &mut self,
        statement: impl Into<String>,
        parameters: HashMap<String, Value>,
        mut options: TxOptions,
    ) -> BoltResult<Success> {
        self.ensure_ready("RUN")?;
        if !self.in_transaction {
            self.inject_bookmark(&mut options);
            self.inject_database(&mut options);
        }

        self.send(Request::Run(RunMessage {
            statement: statement.into(),
            parameters,
            options,
        }))
        .await?;
        let success = Self::expect_success(self.recv().await?)?;
        self.open_streams += 1;
        self.state = ConnectionState::Streaming;
        Ok(success)
    }

    /// Fetch up to `n` records (`-1` for all) from stream `qid` (`-1` for
    /// the last one). Returns the batch and leaves the connection in
    /// `Streaming` when the server paused with `has_more`.
    pub async fn pull(&mut self, n: i64, qid: i64) -> BoltResult<StreamBatch> {
        self.ensure_streaming("PULL")?;
        self.send(Request::Pull(PullMessage { n, qid })).await?;
        self.collect_batch().await
    }

    /// Throw away up to `n` records (`-1` for all) from stream `qid`.
    pub async fn discard(&mut self, n: i64, qid: i64) -> BoltResult<StreamBatch> {
        self.ensure_streaming("DISCARD")?;
        self.send(Request::Discard(DiscardMessage { n, qid })).await?;
        self.collect_batch().await
    }

    async fn collect_batch(&mut self) -> BoltResult<StreamBatch> {
        let mut records = Vec::new();
        loop {
            match self.recv().await? {
                Response::Record(record) => records.push(record),
                Response::Success(summary) => {
                    let has_more = summary.has_more();
                    if !has_more {
                        self.open_streams = self.open_streams.saturating_sub(1);
                        if self.open_streams == 0 {
                            self.state = ConnectionState::Ready;
                        }
                    }
                    return Ok(StreamBatch {
                        records,
                        summary,
                        has_more,
                    });
                }
                Response::Failure(failure) => return Err(failure.into_error()),
                Response::Ignored => {
                    return Err(BoltError::Service(
                        "request was ignored by the server; reset the connection".to_string(),
                    ))
                }
            }
        }
    }

    /// Open an explicit transaction. The tracked bookmark and the
    /// settings' default database are injected when the caller supplied
    /// none.
    pub async fn begin(&mut self, mut options: TxOptions) -> BoltResult<()> {
        self.ensure_ready("BEGIN")?;
        if self.in_transaction {
            return Err(BoltError::Protocol(
                "already in an explicit transaction".to_string(),
            ));
        }
        self.inject_bookmark(&mut options);
        self.inject_database(&mut options);

        self.send(Request::Begin(options)).await?;
        Self::expect_success(self.recv().await?)?;
        self.in_transaction = true;
        Ok(())
    }

    /// Commit the open transaction, returning the bookmark the server
    /// issued for it.
    pub async fn commit(&mut self) -> BoltResult<Option<String>> {
        self.ensure_in_transaction("COMMIT")?;
        self.send(Request::Commit).await?;
        let success = Self::expect_success(self.recv().await?)?;
        self.in_transaction = false;
        Ok(success.bookmark())
    }

    /// Abandon the open transaction.
    pub async fn rollback(&mut self) -> BoltResult<()> {
        self.ensure_in_transaction("ROLLBACK")?;
        self.send(Request::Rollback).await?;
        Self::expect_success(self.recv().await?)?;
        self.in_transaction = false;
        Ok(())
    }

    /// Fetch the routing table. Requires Bolt 4.3+.
    pub async fn route(
        &mut self,
        context: HashMap<String, Value>,
        bookmarks: Vec<String>,
        database: Option<String>,
        imp_user: Option<String>,
    ) -> BoltResult<RoutingTable> {
        if !self.capabilities.routing {
            return Err(BoltError::Protocol(format!(
                "ROUTE requires Bolt 4.3 or later, negotiated {}",
                self.settings.version
            )));
        }
        self.ensure_ready("ROUTE")?;

        self.send(Request::Route(RouteMessage {
            context,
            bookmarks,
            database,
            imp_user,
        }))
        .await?;
        let success = Self::expect_success(self.recv().await?)?;
        RoutingTable::from_metadata(&success.metadata)
            .ok_or_else(|| BoltError::Protocol("ROUTE reply carries no routing table".to_string()))
    }

    /// Report the driver API in use. Requires Bolt 5.4+.
    pub async fn telemetry(&mut self, api: i64) -> BoltResult<()> {
        if !self.capabilities.telemetry {
            return Err(BoltError::Protocol(format!(
                "TELEMETRY requires Bolt 5.4 or later, negotiated {}",
                self.settings.version
            )));
        }
        self.ensure_ready("TELEMETRY")?;

        self.send(Request::Telemetry(api)).await?;
        Self::expect_success(self.recv().await?)?;
        Ok(())
    }

    /// Drop authentication while keeping the connection open. Requires Bolt
    /// 5.1+; the connection waits in `Authenticating` for a
    /// [`logon`](Self::logon).
    pub async fn logoff(&mut self) -> BoltResult<()> {
        if !self.capabilities.reauth {
            return Err(BoltError::Protocol(format!(
                "LOGOFF requires Bolt 5.1 or later, negotiated {}",
                self.settings.version
            )));
        }
        self.ensure_ready("LOGOFF")?;

        self.send(Request::Logoff).await?;
        Self::expect_success(self.recv().await?)?;
        self.state = ConnectionState::Authenticating;
        Ok(())
    }

    /// Authenticate again after a [`logoff`](Self::logoff), possibly as a
    /// different principal.
    pub async fn logon(&mut self, principal: &str, credentials: &str) -> BoltResult<()> {
        if !self.capabilities.reauth {
            return Err(BoltError::Protocol(format!(
                "LOGON requires Bolt 5.1 or later, negotiated {}",
                self.settings.version
            )));
        }
        if self.state != ConnectionState::Authenticating {
            return Err(BoltError::Protocol(format!(
                "LOGON refused in state {:?}",
                self.state
            )));
        }

        self.send(Request::Logon(LogonMessage {
            principal: principal.to_string(),
            credentials: credentials.to_string(),
        }))
        .await?;
        Self::expect_success(self.recv().await?)?;
        self.state = ConnectionState::Ready;
        Ok(())
    }

    /// Clear a failure and any unconsumed work, returning to `Ready`.
    ///
    /// A RESET that itself fails leaves the connection broken; close it.
    pub async fn reset(&mut self) -> BoltResult<()> {
        match self.state {
            ConnectionState::Ready | ConnectionState::Streaming | ConnectionState::Failed => {}
            other => {
                return Err(BoltError::Protocol(format!(
                    "cannot RESET in state {other:?}"
                )))
            }
        }

        self.send(Request::Reset).await?;
        match self.recv().await? {
            Response::Success(_) => {
                self.in_transaction = false;
                self.open_streams = 0;
                self.pending.clear();
                self.state = ConnectionState::Ready;
                Ok(())
            }
            response => {
                self.mark_broken();
                Err(BoltError::Connection(format!(
                    "RESET answered with {}; connection is broken",
                    response.name()
                )))
            }
        }
    }

    /// Close the session: best-effort GOODBYE, then transport teardown.
    /// Safe to call repeatedly.
    pub async fn close(&mut self) {
        let past_handshake = matches!(
            self.state,
            ConnectionState::Ready | ConnectionState::Streaming | ConnectionState::Failed
        );
        if past_handshake && self.settings.version.major >= 3 {
            let _ = self.send(Request::Goodbye).await;
        }
        self.transport.disconnect().await;
        self.state = ConnectionState::Closed;
        self.connected = false;
        self.in_transaction = false;
        self.open_streams = 0;
        self.pending.clear();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether authentication completed and the session is usable.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Whether an explicit transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// The negotiated version; uninitialized before the handshake.
    pub fn version(&self) -> BoltVersion {
        self.settings.version
    }

    /// Capabilities of the negotiated version.
    pub fn capabilities(&self) -> &BoltCapabilities {
        &self.capabilities
    }

    /// Server metadata recorded at authentication.
    pub fn metadata(&self) -> Option<&ConnectionMetadata> {
        self.metadata.as_ref()
    }

    /// The most recent bookmark the server issued on this connection.
    pub fn last_bookmark(&self) -> Option<&str> {
        self.bookmark.as_deref()
    }

    /// The settings the connection runs with (version included once
    /// negotiated).
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    #[cfg(test)]
    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn expect_success(response: Response) -> BoltResult<Success> {
        match response {
            Response::Success(success) => Ok(success),
            Response::Failure(failure) => Err(failure.into_error()),
            Response::Ignored => Err(BoltError::Service(
                "request was ignored by the server; reset the connection".to_string(),
            )),
            Response::Record(_) => Err(BoltError::Protocol(
                "unexpected RECORD outside a streaming batch".to_string(),
            )),
        }
    }

    fn track_bookmark(&mut self, success: &Success) {
        if let Some(bookmark) = success.bookmark() {
            self.bookmark = Some(bookmark);
        }
    }

    fn inject_bookmark(&self, options: &mut TxOptions) {
        if options.bookmarks.is_empty() {
            if let Some(bookmark) = &self.bookmark {
                options.bookmarks = vec![bookmark.clone()];
            }
        }
    }

    fn inject_database(&self, options: &mut TxOptions) {
        if options.database.is_none() {
            options.database = self.settings.database.clone();
        }
    }

    fn mark_broken(&mut self) {
        self.state = ConnectionState::Closed;
        self.connected = false;
    }

    fn ensure_ready(&self, operation: &str) -> BoltResult<()> {
        match self.state {
            ConnectionState::Ready => Ok(()),
            ConnectionState::Failed => Err(BoltError::Protocol(format!(
                "{operation} refused: connection is in a failed state; call reset()"
            ))),
            other => Err(BoltError::Protocol(format!(
                "{operation} refused in state {other:?}"
            ))),
        }
    }

    fn ensure_in_transaction(&self, operation: &str) -> BoltResult<()> {
        self.ensure_ready(operation)?;
        if !self.in_transaction {
            return Err(BoltError::Protocol(format!(
                "{operation} refused: no open transaction"
            )));
        }
        Ok(())
    }

    fn ensure_streaming(&self, operation: &str) -> BoltResult<()> {
        match self.state {
            ConnectionState::Streaming => Ok(()),
            ConnectionState::Failed => Err(BoltError::Protocol(format!(
                "{operation} refused: connection is in a failed state; call reset()"
            ))),
            other => Err(BoltError::Protocol(format!(
                "{operation} refused in state {other:?}: no open stream"
            ))),
        }
    }
}

impl<T: Transport> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("version", &self.settings.version)
            .field("in_transaction", &self.in_transaction)
            .field("open_streams", &self.open_streams)
            .field("bookmark", &self.bookmark)
            .finish()
    }
}
