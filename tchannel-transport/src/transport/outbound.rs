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

//! Outbound unary calls.

use super::translate::{
    CallIdentity, SERVICE_HEADER, application_error_meta, channel_error, deadline_exceeded,
    outbound_headers, read_error, strip_reserved,
};
use super::{Lifecycle, Transport, TransportError};
use crate::error::RpcError;
use crate::peer::{Chooser, FinishFn, Peer};
use crate::rpc::{CallContext, Request, Response};
use crate::serialization::{CallRequest, CallResponse, HeaderFormat, ResponseCode, TransportHeaders};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};

#[cfg(feature = "observability")]
use tracing::debug;

/// Sends unary calls to peers picked by a [`Chooser`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tchannel_transport::peer::{PeerId, Single};
/// use tchannel_transport::rpc::{CallContext, Request};
/// use tchannel_transport::transport::{Outbound, Transport, TransportConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = Transport::new(TransportConfig::new("client"))?;
/// transport.start().await?;
///
/// let chooser = Single::new(PeerId::new("127.0.0.1:4040"), Arc::new(transport.clone()));
/// let outbound = Outbound::new(transport.clone(), Arc::new(chooser));
/// outbound.start().await?;
///
/// let request = Request::new("kv", "get").with_caller("client").with_body("key");
/// let ctx = CallContext::with_timeout(Duration::from_secs(1));
/// let response = outbound.call(&ctx, request).await?;
/// println!("{} bytes", response.body.len());
/// # Ok(())
/// # }
/// ```
pub struct Outbound {
    transport: Transport,
    chooser: Arc<dyn Chooser>,
    lifecycle: Lifecycle,
}

impl Outbound {
    /// Creates an outbound calling through `transport`.
    pub fn new(transport: Transport, chooser: Arc<dyn Chooser>) -> Self {
        Self {
            transport,
            chooser,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Starts the chooser, which retains its peers.
    ///
    /// # Errors
    ///
    /// Returns the chooser's start error. Repeated calls return the first result.
    pub async fn start(&self) -> Result<(), TransportError> {
        self.lifecycle.start(|| self.chooser.start()).await
    }

    /// Stops the chooser, which releases its peers.
    ///
    /// # Errors
    ///
    /// Returns the chooser's stop error. Repeated calls return the first result.
    pub async fn stop(&self) -> Result<(), TransportError> {
        self.lifecycle.stop(|| self.chooser.stop()).await
    }

    /// Returns `true` while running.
    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// The transport calls travel on.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// The chooser picking peers.
    pub fn chooser(&self) -> &Arc<dyn Chooser> {
        &self.chooser
    }

    /// Makes a unary call.
    ///
    /// The context's deadline bounds everything: choosing a peer, connecting
    /// and waiting for the response. A response the callee flagged as an
    /// application error is returned as `Ok` with
    /// [`Response::application_error`] set, unless the callee also attached
    /// an error code, in which case that error is returned.
    ///
    /// # Errors
    ///
    /// - failed precondition if the outbound is not running
    /// - invalid argument if the context has no deadline or the request is
    ///   incomplete
    /// - cancelled if the context is cancelled
    /// - whatever the chooser returns when no peer can be picked
    /// - the translation of any transport failure
    pub async fn call(&self, ctx: &CallContext, request: Request) -> Result<Response, RpcError> {
        if !self.is_running() {
            return Err(RpcError::failed_precondition(format!(
                "outbound for service {:?} has not been started",
                request.service
            )));
        }
        let Some(deadline) = ctx.deadline() else {
            return Err(RpcError::invalid_argument(format!(
                "missing TTL for call to procedure {:?} of service {:?}",
                request.procedure, request.service
            )));
        };
        request.validate()?;
        if ctx.is_cancelled() {
            return Err(cancelled(&request));
        }

        let (peer, finish) = self.chooser.choose(ctx, &request).await?;
        let finish = FinishGuard::new(finish, &request);
        self.transport.metrics().record_call_sent();

        let result = tokio::select! {
            _ = ctx.cancellation().cancelled() => Err(cancelled(&request)),
            result = timeout_at(deadline, self.call_peer(ctx, &request, peer.as_ref(), deadline)) => {
                result.unwrap_or_else(|_| Err(deadline_exceeded(CallIdentity::from(&request))))
            }
        };

        if let Err(_err) = &result {
            self.transport.metrics().record_call_failure();

            #[cfg(feature = "observability")]
            debug!(
                peer = %peer.identifier(),
                service = %request.service,
                procedure = %request.procedure,
                error = %_err,
                "Outbound call failed"
            );
        }
        finish.finish(result.as_ref().err());
        result
    }

    async fn call_peer(
        &self,
        ctx: &CallContext,
        request: &Request,
        peer: &dyn Peer,
        deadline: Instant,
    ) -> Result<Response, RpcError> {
        let identity = CallIdentity::from(request);
        let config = self.transport.config();
        let headers = outbound_headers(
            request,
            ctx,
            config.reserved_headers,
            self.transport.tracing_keys(),
            self.transport.metrics(),
        )?;
        let format = HeaderFormat::for_format(request.encoding.as_str());
        let arg2 = format
            .encode(&headers, config.header_case)
            .map_err(|e| RpcError::invalid_argument(format!("failed to encode headers: {e}")))?;

        let host_port = peer.identifier().as_str();
        let channel = self.transport.channel_for(host_port).ok_or_else(|| {
            RpcError::failed_precondition(format!(
                "transport for service {:?} has not been started",
                self.transport.service_name()
            ))
        })?;
        let connection = channel
            .get_connection(host_port)
            .await
            .map_err(|e| channel_error(e, identity))?;

        let call = CallRequest {
            // Replaced from the deadline when the call is sent.
            ttl: Duration::ZERO,
            headers: TransportHeaders {
                format: request.encoding.to_string(),
                caller_name: request.caller.clone(),
                shard_key: request.shard_key.clone().unwrap_or_default(),
                routing_key: request.routing_key.clone().unwrap_or_default(),
                routing_delegate: request.routing_delegate.clone().unwrap_or_default(),
            },
            service: request.service.clone(),
            procedure: request.procedure.clone(),
            arg2,
            arg3: request.body.clone(),
        };
        let response = connection
            .call(call, deadline)
            .await
            .map_err(|e| channel_error(e, identity))?;
        self.read_response(request, format, response)
    }

    fn read_response(
        &self,
        request: &Request,
        format: HeaderFormat,
        response: CallResponse,
    ) -> Result<Response, RpcError> {
        let mut headers = format.decode(&response.arg2).map_err(|e| {
            RpcError::internal(format!(
                "failed to decode response headers of procedure {:?} of service {:?}: {e}",
                request.procedure, request.service
            ))
        })?;

        if let Some(service) = headers.get(SERVICE_HEADER) {
            if service != request.service {
                return Err(RpcError::internal(format!(
                    "procedure {:?} expected a response from service {:?}, got {:?}",
                    request.procedure, request.service, service
                )));
            }
        }

        let application_error = response.code == ResponseCode::ApplicationError;
        let mut meta = None;
        if application_error {
            self.transport.metrics().record_application_error();
            if let Some(err) = read_error(&headers) {
                return Err(err);
            }
            meta = application_error_meta(&headers);
        }

        strip_reserved(&mut headers);
        Ok(Response {
            headers,
            body: response.arg3,
            application_error,
            application_error_meta: meta,
        })
    }
}

/// Reports the end of a call to the chooser exactly once.
///
/// If the call future is dropped before it completes, the call is reported
/// as cancelled so the peer's pending count is not left raised.
struct FinishGuard<'a> {
    finish: Option<FinishFn>,
    request: &'a Request,
}

impl<'a> FinishGuard<'a> {
    fn new(finish: FinishFn, request: &'a Request) -> Self {
        Self {
            finish: Some(finish),
            request,
        }
    }

    fn finish(mut self, err: Option<&RpcError>) {
        if let Some(finish) = self.finish.take() {
            finish(err);
        }
    }
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        if let Some(finish) = self.finish.take() {
            finish(Some(&cancelled(self.request)));
        }
    }
}

fn cancelled(request: &Request) -> RpcError {
    RpcError::cancelled(format!(
        "call to procedure {:?} of service {:?} was cancelled",
        request.procedure, request.service
    ))
}

impl fmt::Debug for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outbound")
            .field("transport", &self.transport)
            .field("state", &self.lifecycle.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;
    use crate::peer::{PeerId, Single};
    use crate::transport::TransportConfig;

    async fn outbound() -> (Transport, Outbound) {
        let transport = Transport::new(TransportConfig::new("client")).unwrap();
        transport.start().await.unwrap();
        let chooser = Single::new(PeerId::new("127.0.0.1:1"), Arc::new(transport.clone()));
        let outbound = Outbound::new(transport.clone(), Arc::new(chooser));
        (transport, outbound)
    }

    fn request() -> Request {
        Request::new("kv", "get").with_caller("client")
    }

    #[tokio::test]
    async fn test_call_before_start() {
        let (transport, outbound) = outbound().await;
        let ctx = CallContext::with_timeout(Duration::from_secs(1));
        let err = outbound.call(&ctx, request()).await.unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);
        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_deadline() {
        let (transport, outbound) = outbound().await;
        outbound.start().await.unwrap();
        let err = outbound
            .call(&CallContext::new(), request())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        assert!(err.message().contains("missing TTL"));
        outbound.stop().await.unwrap();
        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_incomplete_request() {
        let (transport, outbound) = outbound().await;
        outbound.start().await.unwrap();
        let ctx = CallContext::with_timeout(Duration::from_secs(1));
        let err = outbound
            .call(&ctx, Request::new("kv", "get"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        assert!(err.message().contains("caller name"));
        outbound.stop().await.unwrap();
        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let (transport, outbound) = outbound().await;
        outbound.start().await.unwrap();
        let ctx = CallContext::with_timeout(Duration::from_secs(1));
        ctx.cancellation().cancel();
        let err = outbound.call(&ctx, request()).await.unwrap_err();
        assert_eq!(err.code(), Code::Cancelled);
        outbound.stop().await.unwrap();
        transport.stop().await.unwrap();
    }

    #[test]
    fn test_finish_guard_reports_once() {
        let reports = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let request = request();

        let sink = Arc::clone(&reports);
        let guard = FinishGuard::new(
            Box::new(move |err| sink.lock().push(err.map(RpcError::code))),
            &request,
        );
        guard.finish(None);

        let sink = Arc::clone(&reports);
        drop(FinishGuard::new(
            Box::new(move |err| sink.lock().push(err.map(RpcError::code))),
            &request,
        ));

        assert_eq!(*reports.lock(), [None, Some(Code::Cancelled)]);
    }

    #[tokio::test]
    async fn test_expired_deadline_skips_network() {
        let (transport, outbound) = outbound().await;
        outbound.start().await.unwrap();
        let ctx = CallContext::with_deadline(Instant::now() - Duration::from_millis(1));
        let err = outbound.call(&ctx, request()).await.unwrap_err();
        assert_eq!(err.code(), Code::DeadlineExceeded);
        assert!(err.message().contains("waiting for peer"));
        assert_eq!(transport.metrics().calls_sent(), 0);
        outbound.stop().await.unwrap();
        transport.stop().await.unwrap();
    }
}
