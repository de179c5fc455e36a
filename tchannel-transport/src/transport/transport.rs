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

//! The transport: a shared channel plus a registry of retained peers.

use super::handler::DispatchHandler;
use super::peer::{MaintainerContext, TransportPeer};
use super::{
    BackoffStrategy, Lifecycle, LifecycleState, TracingKeyCache, TransportBuilder,
    TransportConfig, TransportError,
};
use crate::channel::{Channel, ChannelConfig, Dialer, PeerStatusListener, TcpDialer};
use crate::observability::TransportMetrics;
use crate::peer::{Peer, PeerId, PeerTransport, Subscriber};
use crate::rpc::Router;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock, Weak};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[cfg(feature = "observability")]
use tracing::{debug, info};

type Registry = Mutex<HashMap<PeerId, Arc<TransportPeer>>>;

/// The primary channel and any per-destination outbound channels.
pub(crate) struct ChannelSet {
    primary: OnceLock<Channel>,
    outbound: RwLock<HashMap<String, Channel>>,
}

impl ChannelSet {
    fn new() -> Self {
        Self {
            primary: OnceLock::new(),
            outbound: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn primary(&self) -> Option<&Channel> {
        self.primary.get()
    }

    /// The channel calls to `host_port` travel on.
    pub(crate) fn for_peer(&self, host_port: &str) -> Option<Channel> {
        if let Some(channel) = self.outbound.read().get(host_port) {
            return Some(channel.clone());
        }
        self.primary.get().cloned()
    }
}

/// Forwards channel connection changes to the matching registry entry.
struct StatusBridge {
    registry: Weak<Registry>,
}

impl PeerStatusListener for StatusBridge {
    fn on_peer_status_changed(&self, host_port: &str) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        if let Some(peer) = registry.lock().get(host_port) {
            peer.signal();
        }
    }
}

/// A pluggable RPC transport over the multiplexed call protocol.
///
/// One transport owns one channel shared by every [`Outbound`](super::Outbound)
/// and [`Inbound`](super::Inbound) built on it. Peer-selection policies
/// retain peers through [`PeerTransport`]; the transport keeps a background
/// maintainer running per retained address that holds a connection open and
/// reports its status.
///
/// Cloning is cheap; clones share state.
///
/// # Examples
///
/// ```rust,no_run
/// use tchannel_transport::transport::{Transport, TransportConfig};
///
/// # async fn example() -> Result<(), tchannel_transport::transport::TransportError> {
/// let transport = Transport::new(TransportConfig::new("kv").with_listen_addr("127.0.0.1:0"))?;
/// transport.start().await?;
/// println!("listening on {:?}", transport.local_addr());
/// transport.stop().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Transport {
    inner: Arc<TransportInner>,
}

struct TransportInner {
    config: TransportConfig,
    service_name: String,
    lifecycle: Lifecycle,
    registry: Arc<Registry>,
    channels: Arc<ChannelSet>,
    shared_channel: bool,
    listener: Mutex<Option<TcpListener>>,
    listen_addr: RwLock<Option<String>>,
    outbound_dialers: Vec<(String, Arc<dyn Dialer>)>,
    router: RwLock<Option<Arc<dyn Router>>>,
    dialer: Arc<dyn Dialer>,
    backoff: Arc<dyn BackoffStrategy>,
    stopping: CancellationToken,
    maintainers: TaskTracker,
    runtime: Mutex<Option<Handle>>,
    tracing_keys: Arc<TracingKeyCache>,
    metrics: Arc<TransportMetrics>,
    status_bridge: Arc<StatusBridge>,
}

impl Transport {
    /// Creates a transport from configuration alone.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfiguration`] if no service name is
    /// configured.
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        TransportBuilder::new(config).build()
    }

    /// Starts a builder for runtime-only collaborators.
    pub fn builder(config: TransportConfig) -> TransportBuilder {
        TransportBuilder::new(config)
    }

    pub(crate) fn from_builder(builder: TransportBuilder) -> Result<Self, TransportError> {
        let TransportBuilder {
            config,
            listener,
            channel,
            dialer,
            backoff,
            outbound_dialers,
        } = builder;

        let service_name = match (&config.service_name, &channel) {
            (Some(name), _) if !name.is_empty() => name.clone(),
            (_, Some(channel)) => channel.service_name().to_string(),
            _ => {
                return Err(TransportError::invalid_configuration(
                    "a service name or a shared channel is required",
                ));
            }
        };
        if channel.is_some() && (listener.is_some() || config.listen_addr.is_some()) {
            return Err(TransportError::invalid_configuration(
                "a shared channel cannot be combined with a listener or listen address",
            ));
        }
        if config.connection_timeout.is_zero() {
            return Err(TransportError::invalid_configuration(
                "connection timeout must be greater than zero",
            ));
        }
        if let Some((destination, _)) = outbound_dialers
            .iter()
            .find(|(destination, _)| destination.is_empty())
        {
            return Err(TransportError::invalid_configuration(format!(
                "invalid outbound destination {destination:?}"
            )));
        }

        let channels = Arc::new(ChannelSet::new());
        let shared_channel = channel.is_some();
        if let Some(channel) = channel {
            let _ = channels.primary.set(channel);
        }

        let registry = Arc::new(Registry::default());
        let status_bridge = Arc::new(StatusBridge {
            registry: Arc::downgrade(&registry),
        });
        let backoff = backoff.unwrap_or_else(|| Arc::new(config.backoff.build()));

        Ok(Self {
            inner: Arc::new(TransportInner {
                listen_addr: RwLock::new(config.listen_addr.clone()),
                config,
                service_name,
                lifecycle: Lifecycle::new(),
                registry,
                channels,
                shared_channel,
                listener: Mutex::new(listener),
                outbound_dialers,
                router: RwLock::new(None),
                dialer: dialer.unwrap_or_else(|| Arc::new(TcpDialer::new())),
                backoff,
                stopping: CancellationToken::new(),
                maintainers: TaskTracker::new(),
                runtime: Mutex::new(Handle::try_current().ok()),
                tracing_keys: Arc::new(TracingKeyCache::new()),
                metrics: Arc::new(TransportMetrics::new()),
                status_bridge,
            }),
        })
    }

    /// Starts the transport.
    ///
    /// Opens the channel (binding the listener if one was configured),
    /// installs the inbound dispatcher if a router is set, and opens the
    /// per-destination outbound channels. Concurrent and repeated calls
    /// return the result of the first.
    ///
    /// # Errors
    ///
    /// Fails if the channel cannot be created or the listener cannot be
    /// bound, or with [`TransportError::Stopped`] if the transport was
    /// stopped first.
    pub async fn start(&self) -> Result<(), TransportError> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .lifecycle
            .start(|| async move { inner.open().await })
            .await
    }

    /// Stops the transport.
    ///
    /// Closes every channel the transport owns, then waits for every peer
    /// maintainer to exit. A shared channel is left open for its owner.
    ///
    /// # Errors
    ///
    /// Repeated calls return the result of the first.
    pub async fn stop(&self) -> Result<(), TransportError> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .lifecycle
            .stop(|| async move {
                inner.close().await;
                Ok(())
            })
            .await
    }

    /// Changes the address the transport will listen on.
    ///
    /// # Errors
    ///
    /// Only allowed before the transport starts.
    pub fn set_listen_addr(&self, address: impl Into<String>) -> Result<(), TransportError> {
        if self.inner.lifecycle.state() != LifecycleState::Idle {
            return Err(TransportError::invalid_configuration(
                "listen address cannot change after start",
            ));
        }
        if self.inner.shared_channel {
            return Err(TransportError::invalid_configuration(
                "a transport on a shared channel does not listen",
            ));
        }
        *self.inner.listen_addr.write() = Some(address.into());
        Ok(())
    }

    /// Sets the router inbound calls are dispatched to.
    ///
    /// Takes effect immediately when the transport is already running.
    pub fn set_router(&self, router: Arc<dyn Router>) {
        *self.inner.router.write() = Some(Arc::clone(&router));
        if let Some(channel) = self.inner.channels.primary() {
            if self.inner.lifecycle.state() == LifecycleState::Running {
                channel.set_handler(self.inner.dispatch_handler(router));
            }
        }
    }

    /// Address the listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.channels.primary().and_then(Channel::local_addr)
    }

    /// The primary channel, once started.
    pub fn channel(&self) -> Option<Channel> {
        self.inner.channels.primary().cloned()
    }

    /// The channel calls to `host_port` travel on, once started.
    pub fn channel_for(&self, host_port: &str) -> Option<Channel> {
        self.inner.channels.for_peer(host_port)
    }

    /// The registry entry for `id`, if retained.
    pub fn peer(&self, id: &PeerId) -> Option<Arc<TransportPeer>> {
        self.inner.registry.lock().get(id).cloned()
    }

    /// Number of retained peers.
    pub fn peer_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// Name of the service this transport serves and calls as.
    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    /// Current configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    /// Lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.inner.lifecycle.state()
    }

    /// Returns `true` while running.
    pub fn is_running(&self) -> bool {
        self.inner.lifecycle.is_running()
    }

    /// Counters for this transport.
    pub fn metrics(&self) -> &Arc<TransportMetrics> {
        &self.inner.metrics
    }

    pub(crate) fn tracing_keys(&self) -> &TracingKeyCache {
        &self.inner.tracing_keys
    }
}

impl TransportInner {
    fn channel_config(&self, dialer: Arc<dyn Dialer>) -> ChannelConfig {
        let config = ChannelConfig::new(self.service_name.clone())
            .with_handshake_timeout(self.config.connection_timeout)
            .with_dialer(dialer);
        match &self.config.process_name {
            Some(process_name) => config.with_process_name(process_name.clone()),
            None => config,
        }
    }

    fn dispatch_handler(&self, router: Arc<dyn Router>) -> Arc<DispatchHandler> {
        Arc::new(DispatchHandler::new(
            router,
            self.config.header_case,
            Arc::clone(&self.metrics),
        ))
    }

    fn watch_channel(&self, channel: &Channel) {
        let bridge: Weak<dyn PeerStatusListener> = Arc::downgrade(&self.status_bridge) as _;
        channel.register_status_listener(bridge);
    }

    async fn open(&self) -> Result<(), TransportError> {
        if let Ok(handle) = Handle::try_current() {
            *self.runtime.lock() = Some(handle);
        }

        let channel = match self.channels.primary() {
            Some(channel) => channel.clone(),
            None => {
                let channel = Channel::with_metrics(
                    self.channel_config(Arc::clone(&self.dialer)),
                    Arc::clone(&self.metrics),
                )?;
                let _ = self.channels.primary.set(channel.clone());
                channel
            }
        };

        if let Err(err) = self.bind(&channel).await {
            if !self.shared_channel {
                channel.close().await;
            }
            return Err(err);
        }
        self.watch_channel(&channel);

        let router = self.router.read().clone();
        if let Some(router) = router {
            channel.set_handler(self.dispatch_handler(router));
        }

        for (destination, dialer) in &self.outbound_dialers {
            let outbound = Channel::with_metrics(
                self.channel_config(Arc::clone(dialer)),
                Arc::clone(&self.metrics),
            )?;
            self.watch_channel(&outbound);
            self.channels
                .outbound
                .write()
                .insert(destination.clone(), outbound);
        }

        #[cfg(feature = "observability")]
        info!(
            service = %self.service_name,
            host_port = %channel.host_port(),
            outbound_channels = self.outbound_dialers.len(),
            "Transport started"
        );
        Ok(())
    }

    async fn bind(&self, channel: &Channel) -> Result<(), TransportError> {
        let listener = self.listener.lock().take();
        if let Some(listener) = listener {
            channel.serve(listener)?;
            return Ok(());
        }
        let listen_addr = self.listen_addr.read().clone();
        if let Some(address) = listen_addr {
            channel.listen(&address).await?;
        }
        Ok(())
    }

    async fn close(&self) {
        self.stopping.cancel();

        if !self.shared_channel {
            if let Some(channel) = self.channels.primary() {
                channel.close().await;
            }
        }
        let outbound: Vec<Channel> = self
            .channels
            .outbound
            .write()
            .drain()
            .map(|(_, channel)| channel)
            .collect();
        for channel in outbound {
            channel.close().await;
        }

        self.maintainers.close();
        self.maintainers.wait().await;

        #[cfg(feature = "observability")]
        info!(service = %self.service_name, "Transport stopped");
    }

    fn maintainer_context(&self) -> MaintainerContext {
        MaintainerContext {
            lifecycle: self.lifecycle.subscribe(),
            channels: Arc::clone(&self.channels),
            backoff: Arc::clone(&self.backoff),
            connection_timeout: self.config.connection_timeout,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl Drop for TransportInner {
    fn drop(&mut self) {
        self.stopping.cancel();
    }
}

impl PeerTransport for Transport {
    /// Retains the peer at `id` for `subscriber`.
    ///
    /// The first retain of an address creates its registry entry and spawns
    /// its maintainer on the current Tokio runtime, or on the runtime the
    /// transport was created or started on when called from elsewhere.
    /// Never waits on the network.
    fn retain_peer(
        &self,
        id: &PeerId,
        subscriber: Weak<dyn Subscriber>,
    ) -> Result<Arc<dyn Peer>, TransportError> {
        let mut registry = self.inner.registry.lock();
        let peer = match registry.get(id) {
            Some(peer) => Arc::clone(peer),
            None => {
                let runtime = Handle::try_current()
                    .ok()
                    .or_else(|| self.inner.runtime.lock().clone())
                    .ok_or(TransportError::NoRuntime)?;
                let (peer, changed) = TransportPeer::new(id.clone(), &self.inner.stopping);
                registry.insert(id.clone(), Arc::clone(&peer));
                self.inner.metrics.record_peer_retained();
                self.inner.maintainers.spawn_on(
                    Arc::clone(&peer).maintain(changed, self.inner.maintainer_context()),
                    &runtime,
                );

                #[cfg(feature = "observability")]
                debug!(peer = %id, "Retained peer");
                peer
            }
        };
        peer.add_subscriber(subscriber);
        Ok(peer)
    }

    /// Releases `subscriber`'s reference to `id`, removing the peer and
    /// stopping its maintainer when it was the last one.
    fn release_peer(
        &self,
        id: &PeerId,
        subscriber: &Weak<dyn Subscriber>,
    ) -> Result<(), TransportError> {
        let mut registry = self.inner.registry.lock();
        let no_such_peer = || TransportError::NoSuchPeer { peer: id.clone() };
        let last = {
            let peer = registry.get(id).ok_or_else(no_such_peer)?;
            if !peer.remove_subscriber(subscriber) {
                return Err(no_such_peer());
            }
            peer.subscriber_count() == 0
        };
        if last {
            if let Some(peer) = registry.remove(id) {
                peer.release();
                self.inner.metrics.record_peer_released();

                #[cfg(feature = "observability")]
                debug!(peer = %id, "Released peer");
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("service_name", &self.inner.service_name)
            .field("state", &self.state())
            .field("peers", &self.peer_count())
            .field("shared_channel", &self.inner.shared_channel)
            .finish_non_exhaustive()
    }
}
