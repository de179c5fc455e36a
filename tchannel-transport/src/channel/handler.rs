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

//! Seams between the channel and the layer above it.

use crate::serialization::{CallResponse, ErrorMessage, TransportHeaders};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;

/// A call request received from a remote peer, decoded from its frame.
#[derive(Debug, Clone)]
pub struct InboundCall {
    /// Target service.
    pub service: String,
    /// Target procedure.
    pub procedure: String,
    /// Transport headers carried by the frame.
    pub headers: TransportHeaders,
    /// Encoded application headers.
    pub arg2: Bytes,
    /// Body.
    pub arg3: Bytes,
    /// Absolute deadline derived from the frame's TTL.
    pub deadline: Instant,
    /// Address the remote peer identified itself with.
    pub remote_host_port: String,
}

/// Serves inbound calls.
///
/// Returning `Err` sends an error frame instead of a call response.
#[async_trait]
pub trait CallHandler: Send + Sync {
    /// Handles one call.
    async fn handle(&self, call: InboundCall) -> Result<CallResponse, ErrorMessage>;
}

/// Observes connection changes for a peer address.
///
/// Fired whenever a connection indexed under `host_port` becomes active or
/// goes away. Listeners are expected to return quickly.
pub trait PeerStatusListener: Send + Sync {
    /// Called after the set of connections for `host_port` changed.
    fn on_peer_status_changed(&self, host_port: &str);
}
