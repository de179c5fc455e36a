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

//! A chooser bound to one peer.

use super::{Chooser, FinishFn, Peer, PeerId, PeerTransport, Subscriber};
use crate::error::RpcError;
use crate::rpc::{CallContext, Request};
use crate::transport::{Lifecycle, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Always chooses the same peer, whatever its status.
///
/// The peer is retained on [`start`](Chooser::start) and released on
/// [`stop`](Chooser::stop).
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tchannel_transport::peer::{Chooser, Single};
/// use tchannel_transport::transport::{Transport, TransportConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = Transport::new(TransportConfig::new("client"))?;
/// let chooser = Single::new("127.0.0.1:4040", Arc::new(transport.clone()));
/// transport.start().await?;
/// chooser.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct Single {
    id: PeerId,
    transport: Arc<dyn PeerTransport>,
    lifecycle: Lifecycle,
    peer: Mutex<Option<Arc<dyn Peer>>>,
    subscriber: Arc<dyn Subscriber>,
}

/// `Single` picks its peer regardless of status, so changes are ignored.
struct Ignore;

impl Subscriber for Ignore {
    fn notify_status_changed(&self, _peer: &PeerId) {}
}

impl Single {
    /// Creates a chooser for the peer at `id`.
    pub fn new(id: impl Into<PeerId>, transport: Arc<dyn PeerTransport>) -> Self {
        Self {
            id: id.into(),
            transport,
            lifecycle: Lifecycle::new(),
            peer: Mutex::new(None),
            subscriber: Arc::new(Ignore),
        }
    }

    /// The peer this chooser is bound to.
    pub fn peer_id(&self) -> &PeerId {
        &self.id
    }

    fn subscriber(&self) -> Weak<dyn Subscriber> {
        Arc::downgrade(&self.subscriber)
    }
}

#[async_trait]
impl Chooser for Single {
    async fn start(&self) -> Result<(), TransportError> {
        self.lifecycle
            .start(|| async {
                let peer = self.transport.retain_peer(&self.id, self.subscriber())?;
                *self.peer.lock() = Some(peer);
                Ok(())
            })
            .await
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.lifecycle
            .stop(|| async {
                self.peer.lock().take();
                self.transport.release_peer(&self.id, &self.subscriber())
            })
            .await
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    async fn choose(
        &self,
        ctx: &CallContext,
        request: &Request,
    ) -> Result<(Arc<dyn Peer>, FinishFn), RpcError> {
        if !self.is_running() {
            return Err(super::not_running(request));
        }
        if ctx.is_expired() {
            return Err(super::waiting_deadline_exceeded(request));
        }
        let peer = self
            .peer
            .lock()
            .clone()
            .ok_or_else(|| super::not_running(request))?;
        peer.start_request();
        let finished = Arc::clone(&peer);
        Ok((peer, Box::new(move |_| finished.end_request())))
    }
}
