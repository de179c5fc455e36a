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

//! Multiplexed framed connections.
//!
//! This module is the wire-level half of the transport. A [`Channel`] owns a
//! listener and a registry of handshaken [`Connection`]s indexed by the
//! `host:port` of the peer they lead to. Many calls share one connection;
//! each is tagged with a message id and matched to its response by the
//! connection's reader task.
//!
//! # Lifecycle of a connection
//!
//! 1. The dialing side sends an init request carrying its advertised
//!    `host:port` and process name. The accepting side answers with an init
//!    response. Both use message id 0.
//! 2. The connection is registered and every [`PeerStatusListener`] is told
//!    the peer's address changed.
//! 3. Call requests, call responses, error frames, and pings flow in both
//!    directions.
//! 4. When either side closes the stream, calls awaiting a response fail with
//!    [`ChannelError::ConnectionLost`], the connection is unregistered, and
//!    listeners are told again.
//!
//! # Serving calls
//!
//! Inbound call requests are handed to the channel's [`CallHandler`] on their
//! own task. The handler runs under the deadline the caller sent; if it
//! overruns, the caller receives a timeout error frame. A handler `Err`
//! becomes an error frame with the system code it carries.
//!
//! # Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use std::sync::Arc;
//! use tchannel_transport::channel::{CallHandler, Channel, ChannelConfig, InboundCall};
//! use tchannel_transport::serialization::{CallResponse, ErrorMessage, ResponseCode};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl CallHandler for Echo {
//!     async fn handle(&self, call: InboundCall) -> Result<CallResponse, ErrorMessage> {
//!         Ok(CallResponse {
//!             code: ResponseCode::Ok,
//!             headers: call.headers,
//!             arg2: call.arg2,
//!             arg3: call.arg3,
//!         })
//!     }
//! }
//!
//! # async fn example() -> Result<(), tchannel_transport::channel::ChannelError> {
//! let channel = Channel::new(ChannelConfig::new("echo"))?;
//! channel.set_handler(Arc::new(Echo));
//! channel.listen("127.0.0.1:4040").await?;
//! # Ok(())
//! # }
//! ```

mod channel;
mod connection;
mod correlation;
mod dialer;
mod error;
mod handler;
mod pending;

pub use channel::{Channel, ChannelConfig, EPHEMERAL_HOST_PORT};
pub use connection::{Connection, Direction};
pub use correlation::MessageIdGenerator;
pub use dialer::{BoxedStream, Dialer, Stream, TcpDialer};
pub use error::ChannelError;
pub use handler::{CallHandler, InboundCall, PeerStatusListener};
pub use pending::{CallResult, PendingCalls};
