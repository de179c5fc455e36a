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

//! Registry entries for retained peers and their connection maintainers.

use super::{BackoffStrategy, ChannelSet, LifecycleState};
use crate::observability::TransportMetrics;
use crate::peer::{ConnectionStatus, Peer, PeerId, PeerStatus, Subscriber};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;

#[cfg(feature = "observability")]
use tracing::debug;

/// A peer retained by at least one subscriber.
///
/// Status is derived by the peer's maintainer task from the live connection
/// count on the channel; subscribers are told whenever it changes.
pub struct TransportPeer {
    id: PeerId,
    status: Mutex<ConnectionStatus>,
    pending: AtomicUsize,
    subscribers: Mutex<Vec<Weak<dyn Subscriber>>>,
    changed: mpsc::Sender<()>,
    released: CancellationToken,
}

/// Everything a maintainer needs from its transport.
pub(crate) struct MaintainerContext {
    pub(crate) lifecycle: watch::Receiver<LifecycleState>,
    pub(crate) channels: Arc<ChannelSet>,
    pub(crate) backoff: Arc<dyn BackoffStrategy>,
    pub(crate) connection_timeout: Duration,
    pub(crate) metrics: Arc<TransportMetrics>,
}

impl TransportPeer {
    /// Creates a peer whose released signal fires when `stopping` does.
    pub(crate) fn new(id: PeerId, stopping: &CancellationToken) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (changed, rx) = mpsc::channel(1);
        let peer = Arc::new(Self {
            id,
            status: Mutex::new(ConnectionStatus::Connecting),
            pending: AtomicUsize::new(0),
            subscribers: Mutex::new(Vec::new()),
            changed,
            released: stopping.child_token(),
        });
        (peer, rx)
    }

    /// Wakes the maintainer. Signals coalesce while one is pending.
    pub(crate) fn signal(&self) {
        let _ = self.changed.try_send(());
    }

    pub(crate) fn add_subscriber(&self, subscriber: Weak<dyn Subscriber>) {
        let mut subscribers = self.subscribers.lock();
        if !subscribers.iter().any(|s| same_subscriber(s, &subscriber)) {
            subscribers.push(subscriber);
        }
    }

    /// Returns `false` if `subscriber` was not subscribed.
    pub(crate) fn remove_subscriber(&self, subscriber: &Weak<dyn Subscriber>) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| !same_subscriber(s, subscriber));
        subscribers.len() != before
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Stops the maintainer. Safe to call more than once.
    pub(crate) fn release(&self) {
        self.released.cancel();
    }

    /// Returns `true` once the peer has been released or its transport stopped.
    pub fn is_released(&self) -> bool {
        self.released.is_cancelled()
    }

    fn set_status(&self, status: ConnectionStatus) {
        {
            let mut current = self.status.lock();
            if *current == status {
                return;
            }
            *current = status;
        }

        #[cfg(feature = "observability")]
        debug!(peer = %self.id, ?status, "Peer status changed");

        let subscribers: Vec<_> = self
            .subscribers
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for subscriber in subscribers {
            subscriber.notify_status_changed(&self.id);
        }
    }

    /// Keeps a connection to the peer open until it is released.
    ///
    /// Waits for the transport to finish starting, then alternates between
    /// waiting for connection changes while connected and dialing with
    /// backoff while not. Every wait, sleep and dial is abandoned as soon as
    /// the peer is released or the transport stops.
    pub(crate) async fn maintain(
        self: Arc<Self>,
        mut changed: mpsc::Receiver<()>,
        mut ctx: MaintainerContext,
    ) {
        let released = self.released.clone();
        let started = tokio::select! {
            _ = released.cancelled() => false,
            started = wait_until_started(&mut ctx.lifecycle) => started,
        };
        if !started {
            return;
        }
        let Some(channel) = ctx.channels.for_peer(self.id.as_str()) else {
            return;
        };

        let host_port = self.id.as_str();
        let backoff = sleep(Duration::ZERO);
        tokio::pin!(backoff);
        let mut attempts: u32 = 0;

        loop {
            if channel.connection_count(host_port) > 0 {
                self.set_status(ConnectionStatus::Available);
                attempts = 0;
                tokio::select! {
                    _ = released.cancelled() => break,
                    signal = changed.recv() => {
                        if signal.is_none() {
                            break;
                        }
                    }
                }
                continue;
            }

            self.set_status(ConnectionStatus::Connecting);
            ctx.metrics.record_connect_attempt();
            let result = tokio::select! {
                _ = released.cancelled() => break,
                result = timeout(ctx.connection_timeout, channel.connect(host_port)) => result,
            };
            let _reason = match result {
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("no connection within {:?}", ctx.connection_timeout),
            };

            self.set_status(ConnectionStatus::Unavailable);
            ctx.metrics.record_connect_failure();
            let delay = ctx.backoff.duration(attempts);
            attempts = attempts.saturating_add(1);

            #[cfg(feature = "observability")]
            debug!(
                peer = %self.id,
                attempt = attempts,
                ?delay,
                reason = %_reason,
                "Failed to connect to peer"
            );

            backoff.as_mut().reset(Instant::now() + delay);
            tokio::select! {
                _ = released.cancelled() => break,
                () = &mut backoff => {}
            }
        }

        #[cfg(feature = "observability")]
        debug!(peer = %self.id, "Peer maintainer exiting");
    }
}

async fn wait_until_started(lifecycle: &mut watch::Receiver<LifecycleState>) -> bool {
    match lifecycle
        .wait_for(|state| *state >= LifecycleState::Running)
        .await
    {
        Ok(state) => *state == LifecycleState::Running,
        Err(_) => false,
    }
}

fn same_subscriber(a: &Weak<dyn Subscriber>, b: &Weak<dyn Subscriber>) -> bool {
    std::ptr::addr_eq(a.as_ptr(), b.as_ptr())
}

impl Peer for TransportPeer {
    fn identifier(&self) -> &PeerId {
        &self.id
    }

    fn status(&self) -> PeerStatus {
        PeerStatus {
            connection_status: *self.status.lock(),
            pending_request_count: self.pending.load(Ordering::Acquire),
        }
    }

    fn start_request(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    fn end_request(&self) {
        let _ = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

impl fmt::Debug for TransportPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportPeer")
            .field("id", &self.id)
            .field("status", &*self.status.lock())
            .field("pending", &self.pending.load(Ordering::Relaxed))
            .field("subscribers", &self.subscriber_count())
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl Subscriber for Counter {
        fn notify_status_changed(&self, _peer: &PeerId) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn peer() -> Arc<TransportPeer> {
        TransportPeer::new(PeerId::new("127.0.0.1:1"), &CancellationToken::new()).0
    }

    #[test]
    fn test_subscribers_are_a_set() {
        let peer = peer();
        let counter: Arc<dyn Subscriber> = Arc::new(Counter::default());
        let weak = Arc::downgrade(&counter);

        peer.add_subscriber(weak.clone());
        peer.add_subscriber(weak.clone());
        assert_eq!(peer.subscriber_count(), 1);

        let other: Arc<dyn Subscriber> = Arc::new(Counter::default());
        assert!(!peer.remove_subscriber(&Arc::downgrade(&other)));
        assert!(peer.remove_subscriber(&weak));
        assert_eq!(peer.subscriber_count(), 0);
    }

    #[test]
    fn test_status_notifies_only_on_change() {
        let peer = peer();
        let counter = Arc::new(Counter::default());
        let subscriber: Arc<dyn Subscriber> = counter.clone();
        peer.add_subscriber(Arc::downgrade(&subscriber));

        peer.set_status(ConnectionStatus::Connecting);
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
        peer.set_status(ConnectionStatus::Available);
        peer.set_status(ConnectionStatus::Available);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(peer.status().connection_status, ConnectionStatus::Available);
    }

    #[test]
    fn test_pending_requests_never_underflow() {
        let peer = peer();
        peer.start_request();
        peer.end_request();
        peer.end_request();
        assert_eq!(peer.status().pending_request_count, 0);
    }

    #[tokio::test]
    async fn test_signals_coalesce() {
        let (peer, mut rx) = TransportPeer::new(PeerId::new("127.0.0.1:1"), &CancellationToken::new());
        peer.signal();
        peer.signal();
        peer.signal();
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_released_follows_stopping() {
        let stopping = CancellationToken::new();
        let (peer, _rx) = TransportPeer::new(PeerId::new("127.0.0.1:1"), &stopping);
        assert!(!peer.is_released());
        stopping.cancel();
        assert!(peer.is_released());
    }
}
