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

#![doc = include_str!("../../README.md")]
#![allow(clippy::module_inception)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! ## Layers
//!
//! - **[`rpc`]**: the transport-agnostic request, response and router model
//! - **[`error`]**: the error taxonomy callers and handlers see
//! - **[`serialization`]**: the wire codec
//! - **[`channel`]**: the connection multiplexer
//! - **[`peer`]**: peer abstractions and peer-selection policies
//! - **[`transport`]**: the transport, its peer registry, outbound and inbound
//! - **[`observability`]**: counters exported through `metrics`

pub mod channel;
pub mod error;
pub mod observability;
pub mod peer;
pub mod rpc;
pub mod serialization;
pub mod transport;

pub use channel::{Channel, ChannelConfig, ChannelError};
pub use error::{Code, RpcError};
pub use observability::TransportMetrics;
pub use peer::{Chooser, PeerId, PeerList, PeerTransport, Single};
pub use rpc::{CallContext, Headers, Request, Response, Router};
pub use transport::{Inbound, Outbound, Transport, TransportConfig, TransportError};
