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

//! Peer identity and status.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifies a peer by the `host:port` it listens on.
///
/// # Example
///
/// ```rust
/// use tchannel_transport::peer::PeerId;
///
/// let id = PeerId::from("127.0.0.1:4040");
/// assert_eq!(id.as_str(), "127.0.0.1:4040");
/// assert_eq!(id.to_string(), "127.0.0.1:4040");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Creates an identifier from a `host:port` string.
    pub fn new(host_port: impl Into<String>) -> Self {
        Self(host_port.into())
    }

    /// The `host:port` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PeerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(host_port: &str) -> Self {
        Self(host_port.to_string())
    }
}

impl From<String> for PeerId {
    fn from(host_port: String) -> Self {
        Self(host_port)
    }
}

/// Whether a peer can currently take calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    /// The last connection attempt failed; a retry is scheduled.
    #[default]
    Unavailable,
    /// No connection yet; one is being established.
    Connecting,
    /// At least one connection to the peer is active.
    Available,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionStatus::Unavailable => "unavailable",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Available => "available",
        })
    }
}

/// Snapshot of a peer's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeerStatus {
    /// Connection status.
    pub connection_status: ConnectionStatus,
    /// Calls started on this peer and not yet finished.
    pub pending_request_count: usize,
}
