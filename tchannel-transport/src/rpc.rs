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

//! Transport-agnostic request/response model.
//!
//! Application code and peer choosers only ever see these types. The
//! [`transport`](crate::transport) layer translates them to and from the wire
//! representation in [`serialization`](crate::serialization).
//!
//! - [`Request`] / [`Response`]: a unary call and its result
//! - [`Headers`]: case-insensitive application headers
//! - [`CallContext`]: deadline, cancellation and tracing baggage for one call
//! - [`Router`] / [`UnaryHandler`]: inbound dispatch seams
//! - [`ResponseWriter`]: what a handler writes its response into

mod context;
mod headers;
mod request;
mod response;
mod router;

pub use self::context::CallContext;
pub use self::headers::{HeaderCase, Headers};
pub use self::request::{Encoding, Request};
pub use self::response::{ApplicationErrorMeta, Response, ResponseBuffer, ResponseWriter};
pub use self::router::{HandlerSpec, MapRouter, Procedure, Router, UnaryHandler};
