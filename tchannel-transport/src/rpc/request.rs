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

use super::Headers;
use crate::error::RpcError;
use bytes::Bytes;
use std::borrow::Cow;
use std::fmt;

/// Name of the encoding a request body uses.
///
/// The encoding doubles as the wire format (`as` transport header). The JSON
/// encoding also switches application headers to the JSON header codec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Encoding(Cow<'static, str>);

impl Encoding {
    /// Opaque bytes.
    pub const RAW: Encoding = Encoding(Cow::Borrowed("raw"));
    /// JSON bodies and JSON-encoded headers.
    pub const JSON: Encoding = Encoding(Cow::Borrowed("json"));
    /// Thrift bodies.
    pub const THRIFT: Encoding = Encoding(Cow::Borrowed("thrift"));
    /// Protobuf bodies.
    pub const PROTO: Encoding = Encoding(Cow::Borrowed("proto"));

    /// Creates an encoding from an arbitrary name.
    pub fn new(name: impl Into<String>) -> Self {
        Encoding(Cow::Owned(name.into()))
    }

    /// The encoding's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty encoding name.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Encoding {
    fn from(name: &str) -> Self {
        Encoding::new(name)
    }
}

impl From<String> for Encoding {
    fn from(name: String) -> Self {
        Encoding::new(name)
    }
}

/// A unary RPC request.
///
/// # Examples
///
/// ```rust
/// use tchannel_transport::rpc::{Encoding, Request};
///
/// let request = Request::new("billing", "charge")
///     .with_caller("checkout")
///     .with_encoding(Encoding::JSON)
///     .with_body(r#"{"cents":100}"#);
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// Name of the calling service.
    pub caller: String,
    /// Name of the service being called.
    pub service: String,
    /// Procedure (method) being called.
    pub procedure: String,
    /// Encoding of the body.
    pub encoding: Encoding,
    /// Application headers.
    pub headers: Headers,
    /// Shard key for sharded services.
    pub shard_key: Option<String>,
    /// Routing key overriding the service for traffic routing.
    pub routing_key: Option<String>,
    /// Service that should route the request on the callee side.
    pub routing_delegate: Option<String>,
    /// Procedure of the caller that issued this request.
    pub caller_procedure: Option<String>,
    /// Request body.
    pub body: Bytes,
}

impl Request {
    /// Creates a raw-encoded request for `service::procedure`.
    pub fn new(service: impl Into<String>, procedure: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            procedure: procedure.into(),
            encoding: Encoding::RAW,
            ..Self::default()
        }
    }

    /// Sets the caller name.
    #[must_use]
    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = caller.into();
        self
    }

    /// Sets the encoding.
    #[must_use]
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Adds an application header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(key, value);
        self
    }

    /// Sets the shard key.
    #[must_use]
    pub fn with_shard_key(mut self, shard_key: impl Into<String>) -> Self {
        self.shard_key = Some(shard_key.into());
        self
    }

    /// Sets the routing key.
    #[must_use]
    pub fn with_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_key = Some(routing_key.into());
        self
    }

    /// Sets the routing delegate.
    #[must_use]
    pub fn with_routing_delegate(mut self, routing_delegate: impl Into<String>) -> Self {
        self.routing_delegate = Some(routing_delegate.into());
        self
    }

    /// Sets the caller procedure.
    #[must_use]
    pub fn with_caller_procedure(mut self, procedure: impl Into<String>) -> Self {
        self.caller_procedure = Some(procedure.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Checks that every field a call needs is present.
    ///
    /// # Errors
    ///
    /// Returns an invalid-argument error naming all missing fields.
    pub fn validate(&self) -> Result<(), RpcError> {
        let mut missing = Vec::new();
        if self.caller.is_empty() {
            missing.push("caller name");
        }
        if self.service.is_empty() {
            missing.push("service name");
        }
        if self.procedure.is_empty() {
            missing.push("procedure");
        }
        if self.encoding.is_empty() {
            missing.push("encoding");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RpcError::invalid_argument(format!(
                "missing {}",
                missing.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;

    #[test]
    fn test_validate_lists_missing_fields() {
        let err = Request::default().validate().unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        assert_eq!(
            err.message(),
            "missing caller name, service name, procedure, encoding"
        );
    }

    #[test]
    fn test_validate_missing_caller_only() {
        let err = Request::new("svc", "proc").validate().unwrap_err();
        assert_eq!(err.message(), "missing caller name");
    }

    #[test]
    fn test_encoding_constants() {
        assert_eq!(Encoding::JSON.as_str(), "json");
        assert_eq!(Encoding::from("json"), Encoding::JSON);
        assert_eq!(Request::new("a", "b").encoding, Encoding::RAW);
    }
}
