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

use super::{CallContext, Encoding, Request, ResponseWriter};
use crate::error::RpcError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Application code answering unary calls.
#[async_trait]
pub trait UnaryHandler: Send + Sync {
    /// Handles one request, writing the response into `response`.
    ///
    /// Returning an error without marking the response as an application
    /// error fails the call at the transport level. Returning an error after
    /// [`ResponseWriter::set_application_error`] sends it back as an
    /// application error carrying the error's code, name and message.
    async fn handle(
        &self,
        ctx: &CallContext,
        request: Request,
        response: &mut dyn ResponseWriter,
    ) -> Result<(), RpcError>;
}

/// What a [`Router`] resolves a request to.
#[derive(Clone)]
pub enum HandlerSpec {
    /// A request/response handler.
    Unary(Arc<dyn UnaryHandler>),
}

impl fmt::Debug for HandlerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerSpec::Unary(_) => f.write_str("HandlerSpec::Unary"),
        }
    }
}

/// A procedure a router can dispatch to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Procedure {
    /// Service the procedure belongs to.
    pub service: String,
    /// Procedure name.
    pub name: String,
    /// Encoding the procedure expects.
    pub encoding: Encoding,
}

impl Procedure {
    /// Describes `service::name` with the given encoding.
    pub fn new(service: impl Into<String>, name: impl Into<String>, encoding: Encoding) -> Self {
        Self {
            service: service.into(),
            name: name.into(),
            encoding,
        }
    }
}

/// Resolves inbound requests to handlers.
pub trait Router: Send + Sync {
    /// Every procedure this router knows.
    fn procedures(&self) -> Vec<Procedure>;

    /// Picks the handler for `request`.
    ///
    /// # Errors
    ///
    /// Returns an error when no handler matches the request.
    fn choose(&self, ctx: &CallContext, request: &Request) -> Result<HandlerSpec, RpcError>;
}

/// A [`Router`] backed by a map from `(service, procedure)` to handler.
///
/// # Examples
///
/// ```rust
/// use tchannel_transport::rpc::{CallContext, Encoding, MapRouter, Procedure, Request, Router};
///
/// let router = MapRouter::new("echo");
/// let err = router
///     .choose(&CallContext::new(), &Request::new("echo", "missing"))
///     .unwrap_err();
/// assert!(err.message().contains("unknown method"));
/// ```
pub struct MapRouter {
    default_service: String,
    entries: HashMap<(String, String), (Procedure, HandlerSpec)>,
}

impl MapRouter {
    /// Creates an empty router. Requests without a service name resolve
    /// against `default_service`.
    pub fn new(default_service: impl Into<String>) -> Self {
        Self {
            default_service: default_service.into(),
            entries: HashMap::new(),
        }
    }

    /// Registers a unary handler. A procedure registered twice keeps the
    /// latest handler.
    pub fn register(&mut self, procedure: Procedure, handler: Arc<dyn UnaryHandler>) {
        let key = (procedure.service.clone(), procedure.name.clone());
        self.entries
            .insert(key, (procedure, HandlerSpec::Unary(handler)));
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, procedure: Procedure, handler: Arc<dyn UnaryHandler>) -> Self {
        self.register(procedure, handler);
        self
    }
}

impl Router for MapRouter {
    fn procedures(&self) -> Vec<Procedure> {
        let mut procedures: Vec<_> = self
            .entries
            .values()
            .map(|(procedure, _)| procedure.clone())
            .collect();
        procedures.sort_by(|a, b| (&a.service, &a.name).cmp(&(&b.service, &b.name)));
        procedures
    }

    fn choose(&self, _ctx: &CallContext, request: &Request) -> Result<HandlerSpec, RpcError> {
        let service = if request.service.is_empty() {
            self.default_service.as_str()
        } else {
            request.service.as_str()
        };
        let key = (service.to_string(), request.procedure.clone());
        let (procedure, spec) = self.entries.get(&key).ok_or_else(|| {
            RpcError::unimplemented(format!(
                "unknown method {:?} for service {:?}",
                request.procedure, service
            ))
        })?;
        if procedure.encoding != request.encoding {
            return Err(RpcError::invalid_argument(format!(
                "expected encoding {:?} for procedure {:?} of service {:?}, got {:?}",
                procedure.encoding.as_str(),
                request.procedure,
                service,
                request.encoding.as_str()
            )));
        }
        Ok(spec.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;

    struct Noop;

    #[async_trait]
    impl UnaryHandler for Noop {
        async fn handle(
            &self,
            _ctx: &CallContext,
            _request: Request,
            _response: &mut dyn ResponseWriter,
        ) -> Result<(), RpcError> {
            Ok(())
        }
    }

    fn router() -> MapRouter {
        MapRouter::new("kv")
            .with(Procedure::new("kv", "get", Encoding::RAW), Arc::new(Noop))
            .with(Procedure::new("kv", "set", Encoding::JSON), Arc::new(Noop))
    }

    #[test]
    fn test_choose_known_procedure() {
        let spec = router().choose(&CallContext::new(), &Request::new("kv", "get"));
        assert!(matches!(spec, Ok(HandlerSpec::Unary(_))));
    }

    #[test]
    fn test_choose_uses_default_service() {
        let request = Request::new("", "get");
        assert!(router().choose(&CallContext::new(), &request).is_ok());
    }

    #[test]
    fn test_unknown_method() {
        let err = router()
            .choose(&CallContext::new(), &Request::new("kv", "delete"))
            .unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);
        assert!(err.message().contains("unknown method \"delete\""));
    }

    #[test]
    fn test_encoding_mismatch() {
        let err = router()
            .choose(&CallContext::new(), &Request::new("kv", "set"))
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[test]
    fn test_procedures_sorted() {
        let names: Vec<_> = router().procedures().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["get", "set"]);
    }
}
