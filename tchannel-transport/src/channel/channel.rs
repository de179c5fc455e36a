//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! The channel: a listener plus a registry of connections keyed by peer.

use super::ChannelError;
use super::connection::{Connection, Direction};
use super::dialer::{BoxedStream, Dialer, TcpDialer};
use super::handler::{CallHandler, PeerStatusListener};
use crate::observability::TransportMetrics;
use crate::serialization::{
    ErrorMessage, Frame, InitMessage, MessageType, SystemErrorCode, read_frame, write_frame,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[cfg(feature = "observability")]
use tracing::{debug, info, warn};

/// Host and port advertised by a channel that does not listen.
pub const EPHEMERAL_HOST_PORT: &str = "0.0.0.0:0";

/// Configuration for a [`Channel`].
#[derive(Clone)]
pub struct ChannelConfig {
    /// Name of the service this channel serves and calls as.
    pub service_name: String,
    /// Process name sent during the init handshake.
    pub process_name: String,
    /// Upper bound on the init handshake, in either direction.
    pub handshake_timeout: Duration,
    /// Opens outbound streams.
    pub dialer: Arc<dyn Dialer>,
}

impl ChannelConfig {
    /// Creates a configuration for `service_name` with a TCP dialer.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            process_name: format!("tchannel-transport[{}]", std::process::id()),
            handshake_timeout: Duration::from_secs(5),
            dialer: Arc::new(TcpDialer::new()),
        }
    }

    /// Sets the handshake timeout.
    #[must_use]
    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    /// Sets the process name.
    #[must_use]
    pub fn with_process_name(mut self, process_name: impl Into<String>) -> Self {
        self.process_name = process_name.into();
        self
    }

    /// Sets the dialer.
    #[must_use]
    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = dialer;
        self
    }
}

impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("service_name", &self.service_name)
            .field("process_name", &self.process_name)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}

/// A multiplexing endpoint.
///
/// A channel listens for inbound connections (optionally), dials outbound
/// ones on demand, and indexes every handshaken connection under the
/// `host:port` its peer is known by. Status listeners are told whenever the
/// connections for an address change.
///
/// Cloning is cheap; clones share the same connections.
///
/// # Examples
///
/// ```rust,no_run
/// use tchannel_transport::channel::{Channel, ChannelConfig};
///
/// # async fn example() -> Result<(), tchannel_transport::channel::ChannelError> {
/// let server = Channel::new(ChannelConfig::new("kv"))?;
/// server.listen("127.0.0.1:0").await?;
///
/// let client = Channel::new(ChannelConfig::new("kv-client"))?;
/// let connection = client.connect(&server.host_port()).await?;
/// assert!(connection.is_active());
///
/// client.close().await;
/// server.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

pub(crate) struct ChannelInner {
    config: ChannelConfig,
    local_addr: RwLock<Option<SocketAddr>>,
    connections: Mutex<HashMap<String, Vec<Arc<Connection>>>>,
    next_connection_id: AtomicU64,
    handler: RwLock<Option<Arc<dyn CallHandler>>>,
    listeners: Mutex<Vec<Weak<dyn PeerStatusListener>>>,
    closing: AtomicBool,
    accepting: CancellationToken,
    shutdown: CancellationToken,
    inbound_calls: TaskTracker,
    connection_tasks: TaskTracker,
    metrics: Arc<TransportMetrics>,
}

impl Channel {
    /// Creates a channel.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidConfiguration`] if the service name is empty.
    pub fn new(config: ChannelConfig) -> Result<Self, ChannelError> {
        Self::with_metrics(config, Arc::new(TransportMetrics::new()))
    }

    /// Creates a channel that reports into `metrics`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidConfiguration`] if the service name is empty.
    pub fn with_metrics(
        config: ChannelConfig,
        metrics: Arc<TransportMetrics>,
    ) -> Result<Self, ChannelError> {
        if config.service_name.is_empty() {
            return Err(ChannelError::InvalidConfiguration {
                reason: "service name is required".to_string(),
            });
        }

        Ok(Self {
            inner: Arc::new(ChannelInner {
                config,
                local_addr: RwLock::new(None),
                connections: Mutex::new(HashMap::new()),
                next_connection_id: AtomicU64::new(1),
                handler: RwLock::new(None),
                listeners: Mutex::new(Vec::new()),
                closing: AtomicBool::new(false),
                accepting: CancellationToken::new(),
                shutdown: CancellationToken::new(),
                inbound_calls: TaskTracker::new(),
                connection_tasks: TaskTracker::new(),
                metrics,
            }),
        })
    }

    /// Name of the service this channel belongs to.
    pub fn service_name(&self) -> &str {
        &self.inner.config.service_name
    }

    /// Binds `address` and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Fails if the address cannot be bound, the channel already listens, or
    /// the channel is closed.
    pub async fn listen(&self, address: &str) -> Result<SocketAddr, ChannelError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| ChannelError::BindFailed {
                address: address.to_string(),
                source: Arc::new(e),
            })?;
        self.serve(listener)
    }

    /// Starts accepting connections on an already bound listener.
    ///
    /// # Errors
    ///
    /// Fails if the channel already listens or is closed.
    pub fn serve(&self, listener: TcpListener) -> Result<SocketAddr, ChannelError> {
        if self.inner.is_closing() {
            return Err(ChannelError::Closed);
        }
        let local_addr = listener.local_addr().map_err(|e| ChannelError::BindFailed {
            address: "listener".to_string(),
            source: Arc::new(e),
        })?;

        {
            let mut slot = self.inner.local_addr.write();
            if slot.is_some() {
                return Err(ChannelError::InvalidConfiguration {
                    reason: "channel is already listening".to_string(),
                });
            }
            *slot = Some(local_addr);
        }

        #[cfg(feature = "observability")]
        info!(
            service = %self.inner.config.service_name,
            address = %local_addr,
            "Channel listening"
        );

        let inner = Arc::clone(&self.inner);
        self.inner
            .connection_tasks
            .spawn(ChannelInner::accept_loop(inner, listener));
        Ok(local_addr)
    }

    /// Address this channel advertises to peers.
    ///
    /// [`EPHEMERAL_HOST_PORT`] until the channel listens.
    pub fn host_port(&self) -> String {
        self.inner.host_port()
    }

    /// Address the listener is bound to, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.local_addr.read()
    }

    /// Dials `host_port` and completes the init handshake.
    ///
    /// The resulting connection is indexed under `host_port` as given.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Closed`] if the channel is closing
    /// - [`ChannelError::ConnectFailed`] if the dial fails
    /// - [`ChannelError::Handshake`] or [`ChannelError::Timeout`] if the
    ///   handshake does not complete
    pub async fn connect(&self, host_port: &str) -> Result<Arc<Connection>, ChannelError> {
        let inner = &self.inner;
        if inner.is_closing() {
            return Err(ChannelError::Closed);
        }

        let stream = inner
            .config
            .dialer
            .dial(host_port)
            .await
            .map_err(|e| ChannelError::connect_failed(host_port, e))?;

        let (stream, remote) = timeout(
            inner.config.handshake_timeout,
            inner.initiate_handshake(stream, host_port),
        )
        .await
        .map_err(|_| ChannelError::Timeout {
            operation: "init response",
        })??;

        if inner.is_closing() {
            return Err(ChannelError::Closed);
        }

        Ok(inner.add_connection(
            Direction::Outbound,
            host_port.to_string(),
            remote.process_name,
            stream,
        ))
    }

    /// Returns an active connection to `host_port`, dialing one if none exists.
    ///
    /// Connections accepted from the peer count too, so a peer that dialed us
    /// is called back over its own connection.
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect).
    pub async fn get_connection(&self, host_port: &str) -> Result<Arc<Connection>, ChannelError> {
        match self.active_connection(host_port) {
            Some(connection) => Ok(connection),
            None => self.connect(host_port).await,
        }
    }

    /// Returns an active connection to `host_port` without dialing.
    pub fn active_connection(&self, host_port: &str) -> Option<Arc<Connection>> {
        self.inner
            .connections
            .lock()
            .get(host_port)
            .and_then(|connections| connections.iter().find(|c| c.is_active()).cloned())
    }

    /// Number of active connections to `host_port`, inbound and outbound.
    pub fn connection_count(&self, host_port: &str) -> usize {
        self.inner
            .connections
            .lock()
            .get(host_port)
            .map_or(0, |connections| connections.iter().filter(|c| c.is_active()).count())
    }

    /// Number of active connections across all peers.
    pub fn total_connections(&self) -> usize {
        self.inner
            .connections
            .lock()
            .values()
            .flatten()
            .filter(|c| c.is_active())
            .count()
    }

    /// Installs the handler for inbound calls, replacing any previous one.
    pub fn set_handler(&self, handler: Arc<dyn CallHandler>) {
        *self.inner.handler.write() = Some(handler);
    }

    /// Registers a listener for connection changes.
    ///
    /// Only a weak reference is kept; dropped listeners are pruned.
    pub fn register_status_listener(&self, listener: Weak<dyn PeerStatusListener>) {
        self.inner.listeners.lock().push(listener);
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closing()
    }

    /// Closes the channel.
    ///
    /// Stops accepting, declines new inbound calls, lets inbound calls
    /// already running finish (each is bounded by its own deadline), then
    /// closes every connection and waits for their tasks to exit.
    /// Idempotent.
    pub async fn close(&self) {
        let inner = &self.inner;
        let _already_closing = inner.closing.swap(true, Ordering::SeqCst);

        #[cfg(feature = "observability")]
        if !_already_closing {
            info!(service = %inner.config.service_name, "Closing channel");
        }

        inner.accepting.cancel();
        inner.inbound_calls.close();
        inner.inbound_calls.wait().await;
        inner.shutdown.cancel();
        inner.connection_tasks.close();
        inner.connection_tasks.wait().await;
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("service_name", &self.inner.config.service_name)
            .field("host_port", &self.host_port())
            .field("connections", &self.total_connections())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ChannelInner {
    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub(crate) fn connection_tasks(&self) -> &TaskTracker {
        &self.connection_tasks
    }

    pub(crate) fn inbound_calls(&self) -> &TaskTracker {
        &self.inbound_calls
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    pub(crate) fn handler(&self) -> Option<Arc<dyn CallHandler>> {
        self.handler.read().clone()
    }

    fn host_port(&self) -> String {
        match *self.local_addr.read() {
            Some(addr) => addr.to_string(),
            None => EPHEMERAL_HOST_PORT.to_string(),
        }
    }

    fn add_connection(
        self: &Arc<Self>,
        direction: Direction,
        host_port: String,
        process_name: String,
        stream: BoxedStream,
    ) -> Arc<Connection> {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let connection = Connection::start(
            id,
            direction,
            host_port.clone(),
            process_name,
            stream,
            self,
        );

        self.connections
            .lock()
            .entry(host_port.clone())
            .or_default()
            .push(Arc::clone(&connection));
        self.metrics.record_connection_opened();
        self.notify(&host_port);
        connection
    }

    pub(crate) fn remove_connection(&self, connection: &Connection) {
        let host_port = connection.remote_host_port();
        let removed = {
            let mut connections = self.connections.lock();
            let Some(entries) = connections.get_mut(host_port) else {
                return;
            };
            let before = entries.len();
            entries.retain(|c| c.id() != connection.id());
            let removed = entries.len() != before;
            if entries.is_empty() {
                connections.remove(host_port);
            }
            removed
        };

        if removed {
            self.metrics.record_connection_closed();
            self.notify(host_port);
        }
    }

    fn notify(&self, host_port: &str) {
        let listeners: Vec<_> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in listeners {
            listener.on_peer_status_changed(host_port);
        }
    }

    async fn initiate_handshake(
        &self,
        mut stream: BoxedStream,
        host_port: &str,
    ) -> Result<(BoxedStream, InitMessage), ChannelError> {
        let init = InitMessage::new(self.host_port(), self.config.process_name.clone());
        let request = Frame::new(MessageType::InitRequest, 0, init.encode()?);
        write_frame(&mut stream, &request).await?;

        let frame = read_frame(&mut stream)
            .await?
            .ok_or_else(|| ChannelError::handshake(host_port, "connection closed"))?;

        match frame.message_type {
            MessageType::InitResponse => {
                let remote = InitMessage::decode(frame.payload)
                    .map_err(|e| ChannelError::handshake(host_port, e.to_string()))?;
                Ok((stream, remote))
            }
            MessageType::Error => {
                let reason = ErrorMessage::decode(frame.payload)
                    .map(|err| err.to_string())
                    .unwrap_or_else(|e| e.to_string());
                Err(ChannelError::handshake(host_port, reason))
            }
            other => Err(ChannelError::handshake(
                host_port,
                format!("unexpected {other:?} frame"),
            )),
        }
    }

    async fn accept_handshake(
        &self,
        mut stream: BoxedStream,
        peer_addr: SocketAddr,
    ) -> Result<(BoxedStream, InitMessage), ChannelError> {
        let source = peer_addr.to_string();
        let frame = read_frame(&mut stream)
            .await?
            .ok_or_else(|| ChannelError::handshake(&source, "connection closed"))?;

        if frame.message_type != MessageType::InitRequest {
            let message = format!("expected init request, got {:?}", frame.message_type);
            let reply = ErrorMessage::new(SystemErrorCode::ProtocolError, message.clone());
            let reply = Frame::new(MessageType::Error, frame.id, reply.encode());
            let _ = write_frame(&mut stream, &reply).await;
            return Err(ChannelError::handshake(&source, message));
        }

        let remote = match InitMessage::decode(frame.payload) {
            Ok(remote) => remote,
            Err(e) => {
                let reply = ErrorMessage::new(SystemErrorCode::ProtocolError, e.to_string());
                let reply = Frame::new(MessageType::Error, frame.id, reply.encode());
                let _ = write_frame(&mut stream, &reply).await;
                return Err(ChannelError::handshake(&source, e.to_string()));
            }
        };

        let init = InitMessage::new(self.host_port(), self.config.process_name.clone());
        write_frame(
            &mut stream,
            &Frame::new(MessageType::InitResponse, frame.id, init.encode()?),
        )
        .await?;
        Ok((stream, remote))
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            let (socket, peer_addr) = tokio::select! {
                _ = self.accepting.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(_e) => {
                        #[cfg(feature = "observability")]
                        warn!(error = %_e, "Failed to accept connection");
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        continue;
                    }
                },
            };

            let inner = Arc::clone(&self);
            self.connection_tasks
                .spawn(async move { inner.handle_accepted(socket, peer_addr).await });
        }

        #[cfg(feature = "observability")]
        debug!(service = %self.config.service_name, "Accept loop stopped");
    }

    async fn handle_accepted(self: Arc<Self>, socket: TcpStream, peer_addr: SocketAddr) {
        let _ = socket.set_nodelay(true);
        let stream: BoxedStream = Box::new(socket);

        let handshake = timeout(
            self.config.handshake_timeout,
            self.accept_handshake(stream, peer_addr),
        );
        let handshake = tokio::select! {
            _ = self.shutdown.cancelled() => return,
            result = handshake => result,
        };

        let (stream, remote) = match handshake {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(_e)) => {
                #[cfg(feature = "observability")]
                warn!(peer = %peer_addr, error = %_e, "Inbound handshake failed");
                return;
            }
            Err(_) => {
                #[cfg(feature = "observability")]
                warn!(peer = %peer_addr, "Inbound handshake timed out");
                return;
            }
        };

        if self.is_closing() {
            return;
        }

        // Peers that do not listen advertise an ephemeral address; index them
        // by socket address so their connections stay distinguishable.
        let host_port = if is_ephemeral(&remote.host_port) {
            peer_addr.to_string()
        } else {
            remote.host_port
        };
        self.add_connection(Direction::Inbound, host_port, remote.process_name, stream);
    }
}

fn is_ephemeral(host_port: &str) -> bool {
    host_port.is_empty() || host_port == EPHEMERAL_HOST_PORT || host_port.ends_with(":0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::InboundCall;
    use crate::serialization::{CallRequest, CallResponse, ResponseCode, TransportHeaders};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::Instant;

    struct Echo;

    #[async_trait]
    impl CallHandler for Echo {
        async fn handle(&self, call: InboundCall) -> Result<CallResponse, ErrorMessage> {
            if call.procedure == "fail" {
                return Err(ErrorMessage::new(SystemErrorCode::Busy, "too busy"));
            }
            Ok(CallResponse {
                code: ResponseCode::Ok,
                headers: TransportHeaders::default(),
                arg2: call.arg2,
                arg3: call.arg3,
            })
        }
    }

    #[derive(Default)]
    struct CountingListener {
        events: AtomicUsize,
    }

    impl PeerStatusListener for CountingListener {
        fn on_peer_status_changed(&self, _host_port: &str) {
            self.events.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn request(procedure: &str) -> CallRequest {
        CallRequest {
            ttl: Duration::ZERO,
            headers: TransportHeaders {
                format: "raw".into(),
                caller_name: "client".into(),
                ..Default::default()
            },
            service: "echo".into(),
            procedure: procedure.into(),
            arg2: Bytes::new(),
            arg3: Bytes::from_static(b"hello"),
        }
    }

    async fn server() -> Channel {
        let server = Channel::new(ChannelConfig::new("echo")).unwrap();
        server.set_handler(Arc::new(Echo));
        server.listen("127.0.0.1:0").await.unwrap();
        server
    }

    #[test]
    fn test_empty_service_name_rejected() {
        assert!(matches!(
            Channel::new(ChannelConfig::new("")),
            Err(ChannelError::InvalidConfiguration { .. })
        ));
    }

    #[tokio::test]
    async fn test_host_port_is_ephemeral_until_listening() {
        let channel = Channel::new(ChannelConfig::new("svc")).unwrap();
        assert_eq!(channel.host_port(), EPHEMERAL_HOST_PORT);
        let addr = channel.listen("127.0.0.1:0").await.unwrap();
        assert_eq!(channel.host_port(), addr.to_string());
        assert!(channel.listen("127.0.0.1:0").await.is_err());
        channel.close().await;
    }

    #[tokio::test]
    async fn test_call_round_trip() {
        let server = server().await;
        let client = Channel::new(ChannelConfig::new("client")).unwrap();
        let connection = client.connect(&server.host_port()).await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(1);
        let response = connection.call(request("echo"), deadline).await.unwrap();
        assert_eq!(response.arg3, Bytes::from_static(b"hello"));
        assert_eq!(connection.pending_calls(), 0);

        let reused = client.get_connection(&server.host_port()).await.unwrap();
        assert_eq!(reused.id(), connection.id());
        assert_eq!(client.total_connections(), 1);

        client.close().await;
        server.close().await;
    }

    #[tokio::test]
    async fn test_error_frame_surfaces_as_system_error() {
        let server = server().await;
        let client = Channel::new(ChannelConfig::new("client")).unwrap();
        let connection = client.connect(&server.host_port()).await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(1);
        let err = connection.call(request("fail"), deadline).await.unwrap_err();
        assert!(matches!(
            err,
            ChannelError::System {
                code: SystemErrorCode::Busy,
                ..
            }
        ));

        client.close().await;
        server.close().await;
    }

    #[tokio::test]
    async fn test_missing_handler_is_bad_request() {
        let server = Channel::new(ChannelConfig::new("echo")).unwrap();
        server.listen("127.0.0.1:0").await.unwrap();
        let client = Channel::new(ChannelConfig::new("client")).unwrap();
        let connection = client.connect(&server.host_port()).await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(1);
        let err = connection.call(request("echo"), deadline).await.unwrap_err();
        assert!(matches!(
            err,
            ChannelError::System {
                code: SystemErrorCode::BadRequest,
                ..
            }
        ));

        client.close().await;
        server.close().await;
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = Channel::new(ChannelConfig::new("client")).unwrap();
        assert!(matches!(
            client.connect(&addr).await,
            Err(ChannelError::ConnectFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_listeners_see_connect_and_close() {
        let server = server().await;
        let client = Channel::new(ChannelConfig::new("client")).unwrap();
        let listener = Arc::new(CountingListener::default());
        let weak: Weak<CountingListener> = Arc::downgrade(&listener);
        client.register_status_listener(weak);

        let host_port = server.host_port();
        client.connect(&host_port).await.unwrap();
        assert_eq!(client.connection_count(&host_port), 1);
        assert_eq!(listener.events.load(Ordering::SeqCst), 1);

        server.close().await;
        for _ in 0..100 {
            if client.connection_count(&host_port) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(client.connection_count(&host_port), 0);
        assert_eq!(listener.events.load(Ordering::SeqCst), 2);
        client.close().await;
    }

    #[tokio::test]
    async fn test_inbound_connection_indexed_by_advertised_address() {
        let first = server().await;
        let second = server().await;
        second.connect(&first.host_port()).await.unwrap();

        for _ in 0..100 {
            if first.connection_count(&second.host_port()) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(first.connection_count(&second.host_port()), 1);

        first.close().await;
        second.close().await;
    }

    #[tokio::test]
    async fn test_connect_after_close() {
        let client = Channel::new(ChannelConfig::new("client")).unwrap();
        client.close().await;
        client.close().await;
        assert!(client.is_closed());
        assert!(matches!(
            client.connect("127.0.0.1:1").await,
            Err(ChannelError::Closed)
        ));
    }
}
