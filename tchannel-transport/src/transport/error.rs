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

//! Transport layer error types.
//!
//! [`TransportError`] covers lifecycle and peer-registry failures. It is
//! cloneable because the result of the first `start` or `stop` is cached and
//! handed to every later caller. Per-call failures never use this type; they
//! are translated to [`RpcError`](crate::error::RpcError) at the outbound and
//! inbound boundary.

use crate::channel::ChannelError;
use crate::peer::PeerId;
use thiserror::Error;

/// Errors returned by transport lifecycle and peer management.
///
/// # Examples
///
/// ```rust
/// use tchannel_transport::peer::PeerId;
/// use tchannel_transport::transport::TransportError;
///
/// let error = TransportError::NoSuchPeer {
///     peer: PeerId::from("127.0.0.1:4040"),
/// };
/// assert_eq!(error.to_string(), "no such peer reference: 127.0.0.1:4040");
/// ```
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The configuration is unusable.
    ///
    /// Returned from construction or the first start; never retried.
    #[error("invalid transport configuration: {reason}")]
    InvalidConfiguration {
        /// What is wrong
        reason: String,
    },

    /// A release did not match any retain.
    #[error("no such peer reference: {peer}")]
    NoSuchPeer {
        /// The peer that was released
        peer: PeerId,
    },

    /// The operation needs a running transport.
    #[error("transport is not running")]
    NotRunning,

    /// The object was stopped before it could start.
    #[error("transport has been stopped")]
    Stopped,

    /// A peer maintainer could not be spawned because no Tokio runtime was
    /// reachable.
    #[error("no Tokio runtime available to maintain peers")]
    NoRuntime,

    /// The underlying channel failed, for example while binding.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl TransportError {
    pub(crate) fn invalid_configuration(reason: impl Into<String>) -> Self {
        TransportError::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_error_is_transparent() {
        let err: TransportError = ChannelError::Closed.into();
        assert_eq!(err.to_string(), "channel is closed");
    }

    #[test]
    fn test_invalid_configuration() {
        let err = TransportError::invalid_configuration("service name is required");
        assert_eq!(
            err.to_string(),
            "invalid transport configuration: service name is required"
        );
    }
}
