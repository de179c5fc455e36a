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

//! Error types for the channel layer.

use crate::serialization::{CodecError, SystemErrorCode};
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by the multiplexer.
///
/// These stay structured all the way up to the transport boundary, which is
/// the only place they are translated into [`RpcError`](crate::error::RpcError).
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// The channel has been closed.
    #[error("channel is closed")]
    Closed,

    /// Invalid channel configuration.
    #[error("invalid channel configuration: {reason}")]
    InvalidConfiguration {
        /// What is wrong
        reason: String,
    },

    /// Binding the listener failed.
    #[error("failed to listen on {address}: {source}")]
    BindFailed {
        /// Address that could not be bound
        address: String,
        /// Underlying error
        #[source]
        source: Arc<io::Error>,
    },

    /// Dialing a peer failed.
    #[error("failed to connect to {host_port}: {source}")]
    ConnectFailed {
        /// Peer address
        host_port: String,
        /// Underlying error
        #[source]
        source: Arc<io::Error>,
    },

    /// The init handshake did not complete.
    #[error("handshake with {host_port} failed: {reason}")]
    Handshake {
        /// Peer address
        host_port: String,
        /// What went wrong
        reason: String,
    },

    /// A connection died while calls were in flight on it.
    #[error("connection to {host_port} lost: {reason}")]
    ConnectionLost {
        /// Peer address
        host_port: String,
        /// Why the connection ended
        reason: String,
    },

    /// An operation did not finish in time.
    #[error("timed out waiting for {operation}")]
    Timeout {
        /// What was being waited for
        operation: &'static str,
    },

    /// The remote side answered with an error frame.
    #[error("{code}: {message}")]
    System {
        /// System error code
        code: SystemErrorCode,
        /// Message sent by the remote side
        message: String,
    },

    /// Encoding or decoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl ChannelError {
    pub(crate) fn connect_failed(host_port: &str, source: io::Error) -> Self {
        ChannelError::ConnectFailed {
            host_port: host_port.to_string(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn handshake(host_port: &str, reason: impl Into<String>) -> Self {
        ChannelError::Handshake {
            host_port: host_port.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn connection_lost(host_port: &str, reason: impl Into<String>) -> Self {
        ChannelError::ConnectionLost {
            host_port: host_port.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ChannelError::System {
            code: SystemErrorCode::Busy,
            message: "try later".into(),
        };
        assert_eq!(err.to_string(), "busy: try later");
        assert_eq!(
            ChannelError::connection_lost("1.2.3.4:5", "reset").to_string(),
            "connection to 1.2.3.4:5 lost: reset"
        );
    }

    #[test]
    fn test_codec_error_is_transparent() {
        let err: ChannelError = CodecError::UnknownMessageType(3).into();
        assert_eq!(err.to_string(), "unknown message type 0x03");
    }
}
