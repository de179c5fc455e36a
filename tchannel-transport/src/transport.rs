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

//! The pluggable RPC transport.
//!
//! A [`Transport`] owns one [`Channel`](crate::channel::Channel) and a
//! registry of the peers its choosers have retained. [`Outbound`] sends
//! calls to peers picked by a [`Chooser`](crate::peer::Chooser);
//! [`Inbound`] serves calls through a [`Router`](crate::rpc::Router).
//!
//! # Peer Lifecycle
//!
//! ```text
//!   retain_peer (first subscriber)          release_peer (last subscriber)
//!          │                                          │
//!          ▼                                          ▼
//!   ┌────────────┐  connected  ┌───────────┐    ┌──────────┐
//!   │ Connecting │ ──────────▶ │ Available │    │ released │
//!   └────────────┘             └───────────┘    └──────────┘
//!       ▲     │ failed              │ connections gone
//!       │     ▼                     │
//!   ┌─────────────┐                 │
//!   │ Unavailable │ ◀───────────────┘ (via Connecting)
//!   └─────────────┘
//!      backoff
//! ```
//!
//! Every retained peer has one maintainer task. While the peer has a live
//! connection the maintainer sleeps until the channel reports a change for
//! its address; otherwise it dials, backing off between failures. Releasing
//! the peer or stopping the transport interrupts it wherever it is waiting,
//! including an in-flight dial.
//!
//! # Errors at the Boundary
//!
//! Channel errors never reach callers directly. [`Outbound::call`] and the
//! inbound dispatcher translate them into [`RpcError`](crate::error::RpcError)
//! with the mapping in [`from_system_code`] and [`to_system_code`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tchannel_transport::peer::{PeerId, PeerList, Selection};
//! use tchannel_transport::rpc::{CallContext, Request};
//! use tchannel_transport::transport::{Outbound, Transport, TransportConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Transport::new(TransportConfig::new("client"))?;
//! transport.start().await?;
//!
//! let list = Arc::new(PeerList::new(Arc::new(transport.clone()), Selection::RoundRobin));
//! list.update([PeerId::new("127.0.0.1:4040")], [])?;
//! let outbound = Outbound::new(transport.clone(), list);
//! outbound.start().await?;
//!
//! let ctx = CallContext::with_timeout(Duration::from_secs(1));
//! let response = outbound
//!     .call(&ctx, Request::new("kv", "get").with_caller("client"))
//!     .await?;
//! assert!(!response.application_error);
//!
//! outbound.stop().await?;
//! transport.stop().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod handler;
mod inbound;
mod lifecycle;
mod outbound;
mod peer;
pub mod strategy;
mod translate;
mod transport;

pub use self::config::{BackoffConfig, ReservedHeaderPolicy, TransportBuilder, TransportConfig};
pub use self::error::TransportError;
pub use self::inbound::Inbound;
pub use self::lifecycle::{Lifecycle, LifecycleState};
pub use self::outbound::Outbound;
pub use self::peer::TransportPeer;
pub use self::strategy::{BackoffStrategy, ExponentialBackoff, ExponentialBackoffBuilder, FixedDelay};
pub use self::translate::{
    APPLICATION_ERROR_CODE_HEADER, APPLICATION_ERROR_DETAILS_HEADER,
    APPLICATION_ERROR_NAME_HEADER, CALLER_PROCEDURE_HEADER, ERROR_CODE_HEADER,
    ERROR_MESSAGE_HEADER, ERROR_NAME_HEADER, RESERVED_PREFIX, SERVICE_HEADER, TRACING_PREFIX,
    TracingKeyCache, from_system_code, is_reserved, to_system_code,
};
pub use self::transport::Transport;

pub(crate) use self::transport::ChannelSet;
