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

//! A chooser over a changing set of peers.

use super::{Chooser, ConnectionStatus, FinishFn, Peer, PeerId, PeerTransport, Subscriber};
use crate::error::RpcError;
use crate::rpc::{CallContext, Request};
use crate::transport::{Lifecycle, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::Notify;

#[cfg(feature = "observability")]
use tracing::debug;

/// How [`PeerList`] picks among available peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    /// Rotate through available peers.
    #[default]
    RoundRobin,
    /// Pick the available peer with the fewest calls in flight; ties rotate.
    FewestPending,
}

/// Chooses among a list of peers, skipping those that are not available.
///
/// When no peer is available, [`choose`](Chooser::choose) waits until one
/// becomes available, the call's deadline passes, or the call is cancelled.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tchannel_transport::peer::{Chooser, PeerId, PeerList, Selection};
/// use tchannel_transport::transport::{Transport, TransportConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = Transport::new(TransportConfig::new("client"))?;
/// let list = PeerList::new(Arc::new(transport.clone()), Selection::FewestPending);
/// list.update(["10.0.0.1:4040", "10.0.0.2:4040"].map(PeerId::from), [])?;
/// transport.start().await?;
/// list.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct PeerList {
    inner: Arc<ListInner>,
}

struct ListInner {
    transport: Arc<dyn PeerTransport>,
    selection: Selection,
    lifecycle: Lifecycle,
    state: Mutex<ListState>,
    changed: Notify,
}

#[derive(Default)]
struct ListState {
    ids: Vec<PeerId>,
    peers: Vec<Arc<dyn Peer>>,
    next: usize,
    /// Whether `peers` holds a retained peer for every id. Flipped only
    /// under the state lock so updates never race start or stop.
    retained: bool,
}

impl Subscriber for ListInner {
    fn notify_status_changed(&self, _peer: &PeerId) {
        self.changed.notify_waiters();
    }
}

impl ListState {
    fn pick(&mut self, selection: Selection) -> Option<Arc<dyn Peer>> {
        let count = self.peers.len();
        if count == 0 {
            return None;
        }
        let start = self.next % count;
        let mut rotated = (0..count).map(|offset| (start + offset) % count);

        let chosen = match selection {
            Selection::RoundRobin => rotated.find(|&i| is_available(&self.peers[i])),
            Selection::FewestPending => rotated
                .filter(|&i| is_available(&self.peers[i]))
                .min_by_key(|&i| self.peers[i].status().pending_request_count),
        }?;

        self.next = chosen + 1;
        Some(Arc::clone(&self.peers[chosen]))
    }
}

fn is_available(peer: &Arc<dyn Peer>) -> bool {
    peer.status().connection_status == ConnectionStatus::Available
}

impl PeerList {
    /// Creates an empty list.
    pub fn new(transport: Arc<dyn PeerTransport>, selection: Selection) -> Self {
        Self {
            inner: Arc::new(ListInner {
                transport,
                selection,
                lifecycle: Lifecycle::new(),
                state: Mutex::new(ListState::default()),
                changed: Notify::new(),
            }),
        }
    }

    /// The selection policy.
    pub fn selection(&self) -> Selection {
        self.inner.selection
    }

    /// Identifiers currently in the list.
    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.inner.state.lock().ids.clone()
    }

    /// Peers currently retained. Empty unless running.
    pub fn peers(&self) -> Vec<Arc<dyn Peer>> {
        self.inner.state.lock().peers.clone()
    }

    fn subscriber(&self) -> Weak<dyn Subscriber> {
        let inner: Weak<ListInner> = Arc::downgrade(&self.inner);
        inner
    }

    /// Adds and removes peers.
    ///
    /// Once started, added peers are retained and removed peers released
    /// immediately; before that the change only takes effect on start.
    /// Duplicate additions and removals of unknown peers are ignored.
    ///
    /// # Errors
    ///
    /// Propagates retain and release failures from the transport.
    pub fn update(
        &self,
        additions: impl IntoIterator<Item = PeerId>,
        removals: impl IntoIterator<Item = PeerId>,
    ) -> Result<(), TransportError> {
        let mut state = self.inner.state.lock();
        let retained = state.retained;

        for id in removals {
            let Some(index) = state.ids.iter().position(|known| *known == id) else {
                continue;
            };
            state.ids.remove(index);
            if retained {
                state.peers.retain(|peer| *peer.identifier() != id);
                self.inner.transport.release_peer(&id, &self.subscriber())?;
            }
        }

        for id in additions {
            if state.ids.contains(&id) {
                continue;
            }
            if retained {
                let peer = self.inner.transport.retain_peer(&id, self.subscriber())?;
                state.peers.push(peer);
            }
            state.ids.push(id);
        }

        drop(state);
        self.inner.changed.notify_waiters();
        Ok(())
    }
}

#[async_trait]
impl Chooser for PeerList {
    async fn start(&self) -> Result<(), TransportError> {
        self.inner
            .lifecycle
            .start(|| async {
                let mut state = self.inner.state.lock();
                let ids = state.ids.clone();
                for id in &ids {
                    let peer = self.inner.transport.retain_peer(id, self.subscriber())?;
                    state.peers.push(peer);
                }
                state.retained = true;
                drop(state);

                #[cfg(feature = "observability")]
                debug!(peers = ids.len(), "Peer list started");
                Ok(())
            })
            .await
    }

    async fn stop(&self) -> Result<(), TransportError> {
        let result = self
            .inner
            .lifecycle
            .stop(|| async {
                let peers = {
                    let mut state = self.inner.state.lock();
                    state.retained = false;
                    std::mem::take(&mut state.peers)
                };
                let mut result = Ok(());
                for peer in peers {
                    if let Err(e) = self
                        .inner
                        .transport
                        .release_peer(peer.identifier(), &self.subscriber())
                    {
                        result = Err(e);
                    }
                }
                result
            })
            .await;
        self.inner.changed.notify_waiters();
        result
    }

    fn is_running(&self) -> bool {
        self.inner.lifecycle.is_running()
    }

    async fn choose(
        &self,
        ctx: &CallContext,
        request: &Request,
    ) -> Result<(Arc<dyn Peer>, FinishFn), RpcError> {
        let deadline = ctx.deadline();
        loop {
            // Register interest before looking so a change between the look
            // and the wait is not missed.
            let changed = self.inner.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            if !self.is_running() {
                return Err(super::not_running(request));
            }
            if ctx.is_expired() {
                return Err(super::waiting_deadline_exceeded(request));
            }

            let chosen = self.inner.state.lock().pick(self.inner.selection);
            if let Some(peer) = chosen {
                peer.start_request();
                let finished = Arc::clone(&peer);
                return Ok((peer, Box::new(move |_| finished.end_request())));
            }

            let expired = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                _ = changed => {}
                _ = expired => return Err(super::waiting_deadline_exceeded(request)),
                _ = ctx.cancellation().cancelled() => {
                    return Err(RpcError::cancelled(format!(
                        "cancelled while waiting for peer to call procedure {:?} of service {:?}",
                        request.procedure, request.service
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;
    use crate::peer::PeerStatus;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct FakePeer {
        id: PeerId,
        status: Mutex<ConnectionStatus>,
        pending: AtomicUsize,
    }

    impl Peer for FakePeer {
        fn identifier(&self) -> &PeerId {
            &self.id
        }

        fn status(&self) -> PeerStatus {
            PeerStatus {
                connection_status: *self.status.lock(),
                pending_request_count: self.pending.load(Ordering::SeqCst),
            }
        }

        fn start_request(&self) {
            self.pending.fetch_add(1, Ordering::SeqCst);
        }

        fn end_request(&self) {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        peers: Mutex<HashMap<PeerId, Arc<FakePeer>>>,
        subscribers: Mutex<Vec<Weak<dyn Subscriber>>>,
        retained: AtomicUsize,
        retain_delay: Duration,
    }

    impl FakeTransport {
        fn peer(&self, id: &str) -> Arc<FakePeer> {
            Arc::clone(
                self.peers
                    .lock()
                    .entry(PeerId::from(id))
                    .or_insert_with(|| {
                        Arc::new(FakePeer {
                            id: PeerId::from(id),
                            status: Mutex::new(ConnectionStatus::Connecting),
                            pending: AtomicUsize::new(0),
                        })
                    }),
            )
        }

        fn set_status(&self, id: &str, status: ConnectionStatus) {
            *self.peer(id).status.lock() = status;
            let subscribers: Vec<_> = self
                .subscribers
                .lock()
                .iter()
                .filter_map(Weak::upgrade)
                .collect();
            for subscriber in subscribers {
                subscriber.notify_status_changed(&PeerId::from(id));
            }
        }
    }

    impl PeerTransport for FakeTransport {
        fn retain_peer(
            &self,
            id: &PeerId,
            subscriber: Weak<dyn Subscriber>,
        ) -> Result<Arc<dyn Peer>, TransportError> {
            std::thread::sleep(self.retain_delay);
            self.retained.fetch_add(1, Ordering::SeqCst);
            self.subscribers.lock().push(subscriber);
            Ok(self.peer(id.as_str()))
        }

        fn release_peer(
            &self,
            _id: &PeerId,
            _subscriber: &Weak<dyn Subscriber>,
        ) -> Result<(), TransportError> {
            self.retained.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn request() -> Request {
        Request::new("svc", "proc").with_caller("caller")
    }

    async fn started(
        transport: &Arc<FakeTransport>,
        selection: Selection,
        ids: &[&str],
    ) -> PeerList {
        let list = PeerList::new(transport.clone(), selection);
        list.update(ids.iter().map(|id| PeerId::from(*id)), [])
            .unwrap();
        list.start().await.unwrap();
        list
    }

    #[tokio::test]
    async fn test_choose_before_start_fails() {
        let transport = Arc::new(FakeTransport::default());
        let list = PeerList::new(transport, Selection::RoundRobin);
        let ctx = CallContext::with_timeout(Duration::from_secs(1));
        let err = list.choose(&ctx, &request()).await.err().expect("choose should fail");
        assert_eq!(err.code(), Code::FailedPrecondition);
    }

    #[tokio::test]
    async fn test_round_robin_skips_unavailable() {
        let transport = Arc::new(FakeTransport::default());
        let list = started(&transport, Selection::RoundRobin, &["a:1", "b:1", "c:1"]).await;
        transport.set_status("a:1", ConnectionStatus::Available);
        transport.set_status("c:1", ConnectionStatus::Available);

        let ctx = CallContext::with_timeout(Duration::from_secs(1));
        let mut chosen = Vec::new();
        for _ in 0..4 {
            let (peer, finish) = list.choose(&ctx, &request()).await.unwrap();
            chosen.push(peer.identifier().to_string());
            finish(None);
        }
        assert_eq!(chosen, ["a:1", "c:1", "a:1", "c:1"]);
    }

    #[tokio::test]
    async fn test_fewest_pending() {
        let transport = Arc::new(FakeTransport::default());
        let list = started(&transport, Selection::FewestPending, &["a:1", "b:1"]).await;
        transport.set_status("a:1", ConnectionStatus::Available);
        transport.set_status("b:1", ConnectionStatus::Available);

        let ctx = CallContext::with_timeout(Duration::from_secs(1));
        let (first, _finish_first) = list.choose(&ctx, &request()).await.unwrap();
        let (second, finish_second) = list.choose(&ctx, &request()).await.unwrap();
        assert_ne!(first.identifier(), second.identifier());
        finish_second(None);

        let (third, _) = list.choose(&ctx, &request()).await.unwrap();
        assert_eq!(third.identifier(), second.identifier());
        assert_eq!(first.status().pending_request_count, 1);
    }

    #[tokio::test]
    async fn test_waits_for_available_peer() {
        let transport = Arc::new(FakeTransport::default());
        let list = started(&transport, Selection::RoundRobin, &["a:1"]).await;

        let waker = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                transport.set_status("a:1", ConnectionStatus::Available);
            })
        };

        let ctx = CallContext::with_timeout(Duration::from_secs(5));
        let (peer, _) = list.choose(&ctx, &request()).await.unwrap();
        assert_eq!(peer.identifier().as_str(), "a:1");
        waker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_while_waiting() {
        let transport = Arc::new(FakeTransport::default());
        let list = started(&transport, Selection::RoundRobin, &["a:1"]).await;

        let ctx = CallContext::with_timeout(Duration::from_millis(100));
        let err = list.choose(&ctx, &request()).await.err().expect("choose should fail");
        assert_eq!(err.code(), Code::DeadlineExceeded);
        assert!(err.message().contains("deadline exceeded while waiting for peer"));
    }

    #[tokio::test]
    async fn test_update_and_stop_release() {
        let transport = Arc::new(FakeTransport::default());
        let list = started(&transport, Selection::RoundRobin, &["a:1"]).await;
        assert_eq!(transport.retained.load(Ordering::SeqCst), 1);

        list.update([PeerId::from("b:1")], [PeerId::from("a:1")])
            .unwrap();
        assert_eq!(list.peer_ids(), [PeerId::from("b:1")]);
        assert_eq!(transport.retained.load(Ordering::SeqCst), 1);

        list.stop().await.unwrap();
        assert_eq!(transport.retained.load(Ordering::SeqCst), 0);
        assert!(list.peers().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_update_during_start_retains_peer() {
        let transport = Arc::new(FakeTransport {
            retain_delay: Duration::from_millis(100),
            ..FakeTransport::default()
        });
        let list = Arc::new(PeerList::new(transport.clone(), Selection::RoundRobin));
        list.update([PeerId::from("a:1")], []).unwrap();

        let starting = {
            let list = Arc::clone(&list);
            tokio::spawn(async move { list.start().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let updating = {
            let list = Arc::clone(&list);
            tokio::task::spawn_blocking(move || list.update([PeerId::from("b:1")], []))
        };
        starting.await.unwrap().unwrap();
        updating.await.unwrap().unwrap();

        assert_eq!(list.peer_ids(), [PeerId::from("a:1"), PeerId::from("b:1")]);
        assert_eq!(list.peers().len(), 2);
        assert_eq!(transport.retained.load(Ordering::SeqCst), 2);

        list.stop().await.unwrap();
        assert_eq!(transport.retained.load(Ordering::SeqCst), 0);
    }
}
