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

//! The seams between transports and peer-selection policies.

use super::{PeerId, PeerStatus};
use crate::error::RpcError;
use crate::rpc::{CallContext, Request};
use crate::transport::TransportError;
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Weak};

/// A handle to a peer owned by a transport.
pub trait Peer: Send + Sync + fmt::Debug {
    /// The peer's identifier.
    fn identifier(&self) -> &PeerId;

    /// Current status.
    fn status(&self) -> PeerStatus;

    /// Marks the start of a call on this peer.
    fn start_request(&self);

    /// Marks the end of a call started with [`start_request`](Self::start_request).
    fn end_request(&self);
}

/// Receives peer status changes.
///
/// Implemented by peer-selection policies. Notifications may be coalesced;
/// a subscriber must re-read [`Peer::status`] rather than track transitions.
pub trait Subscriber: Send + Sync {
    /// Called after the status of `peer` may have changed.
    fn notify_status_changed(&self, peer: &PeerId);
}

/// Hands out reference-counted peers.
///
/// Each `(peer, subscriber)` retain must be matched by one release. A peer
/// stays alive, with a task keeping it connected, for as long as any
/// subscriber holds it. Subscribers are held weakly and compared by address.
pub trait PeerTransport: Send + Sync {
    /// Retains the peer at `id` on behalf of `subscriber`.
    ///
    /// Never blocks on network I/O.
    fn retain_peer(
        &self,
        id: &PeerId,
        subscriber: Weak<dyn Subscriber>,
    ) -> Result<Arc<dyn Peer>, TransportError>;

    /// Releases a peer previously retained by `subscriber`.
    ///
    /// # Errors
    ///
    /// [`TransportError::NoSuchPeer`] if `subscriber` does not hold `id`.
    fn release_peer(
        &self,
        id: &PeerId,
        subscriber: &Weak<dyn Subscriber>,
    ) -> Result<(), TransportError>;
}

/// Invoked exactly once when a call on a chosen peer finishes.
pub type FinishFn = Box<dyn FnOnce(Option<&RpcError>) + Send>;

/// A peer-selection policy.
#[async_trait]
pub trait Chooser: Send + Sync {
    /// Retains the policy's peers.
    async fn start(&self) -> Result<(), TransportError>;

    /// Releases the policy's peers.
    async fn stop(&self) -> Result<(), TransportError>;

    /// Returns `true` between a successful start and stop.
    fn is_running(&self) -> bool;

    /// Picks a peer for `request`.
    ///
    /// The returned [`FinishFn`] must be called once the call is over.
    async fn choose(
        &self,
        ctx: &CallContext,
        request: &Request,
    ) -> Result<(Arc<dyn Peer>, FinishFn), RpcError>;
}
