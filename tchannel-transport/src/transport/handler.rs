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

//! Dispatch of inbound calls to application handlers.

use super::translate::{
    SERVICE_HEADER, inbound_headers, strip_reserved, to_error_message,
    write_application_error_meta, write_error,
};
use crate::channel::{CallHandler, InboundCall};
use crate::observability::TransportMetrics;
use crate::rpc::{
    CallContext, Encoding, HandlerSpec, HeaderCase, Request, ResponseBuffer, Router,
};
use crate::serialization::{
    CallResponse, ErrorMessage, HeaderFormat, ResponseCode, SystemErrorCode, TransportHeaders,
};
use async_trait::async_trait;
use std::sync::Arc;

#[cfg(feature = "observability")]
use tracing::debug;

/// Bridges the channel's [`CallHandler`] seam to a [`Router`].
pub(crate) struct DispatchHandler {
    router: Arc<dyn Router>,
    header_case: HeaderCase,
    metrics: Arc<TransportMetrics>,
}

impl DispatchHandler {
    pub(crate) fn new(
        router: Arc<dyn Router>,
        header_case: HeaderCase,
        metrics: Arc<TransportMetrics>,
    ) -> Self {
        Self {
            router,
            header_case,
            metrics,
        }
    }

    async fn dispatch(&self, call: InboundCall) -> Result<CallResponse, ErrorMessage> {
        let format = HeaderFormat::for_format(&call.headers.format);
        let headers = format.decode(&call.arg2).map_err(|e| {
            ErrorMessage::new(
                SystemErrorCode::BadRequest,
                format!(
                    "failed to decode headers of procedure {:?} of service {:?}: {e}",
                    call.procedure, call.service
                ),
            )
        })?;
        let split = inbound_headers(headers);

        let mut ctx = CallContext::with_deadline(call.deadline);
        for (key, value) in split.baggage {
            ctx.insert_baggage(key, value);
        }

        let service = call.service.clone();
        let wire_format = call.headers.format.clone();
        let request = Request {
            caller: call.headers.caller_name,
            service: call.service,
            procedure: call.procedure,
            encoding: Encoding::from(call.headers.format),
            headers: split.headers,
            shard_key: non_empty(call.headers.shard_key),
            routing_key: non_empty(call.headers.routing_key),
            routing_delegate: non_empty(call.headers.routing_delegate),
            caller_procedure: split.caller_procedure,
            body: call.arg3,
        };
        request.validate().map_err(|e| to_error_message(&e))?;

        let HandlerSpec::Unary(handler) = self.router.choose(&ctx, &request).map_err(|e| {
            #[cfg(feature = "observability")]
            debug!(
                service = %request.service,
                procedure = %request.procedure,
                error = %e,
                "No handler for inbound call"
            );
            to_error_message(&e)
        })?;

        let mut buffer = ResponseBuffer::new();
        let outcome = handler.handle(&ctx, request, &mut buffer).await;
        let application_error = buffer.is_application_error();
        if let Err(err) = &outcome {
            #[cfg(feature = "observability")]
            debug!(
                service = %service,
                error = %err,
                application_error,
                "Inbound handler failed"
            );
            if !application_error {
                return Err(to_error_message(err));
            }
        }

        let response = buffer.into_response();
        let mut headers = response.headers;
        strip_reserved(&mut headers);
        headers.set(SERVICE_HEADER, service);
        if let Some(meta) = &response.application_error_meta {
            write_application_error_meta(&mut headers, meta);
        }
        if let Err(err) = &outcome {
            write_error(&mut headers, err);
        }

        let arg2 = format.encode(&headers, self.header_case).map_err(|e| {
            ErrorMessage::new(
                SystemErrorCode::Unexpected,
                format!("failed to encode response headers: {e}"),
            )
        })?;
        Ok(CallResponse {
            code: if application_error {
                ResponseCode::ApplicationError
            } else {
                ResponseCode::Ok
            },
            headers: TransportHeaders {
                format: wire_format,
                ..TransportHeaders::default()
            },
            arg2,
            arg3: response.body,
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

#[async_trait]
impl CallHandler for DispatchHandler {
    async fn handle(&self, call: InboundCall) -> Result<CallResponse, ErrorMessage> {
        self.metrics.record_inbound_call();
        let result = self.dispatch(call).await;
        if result.is_err() {
            self.metrics.record_inbound_failure();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Code, RpcError};
    use crate::rpc::{ApplicationErrorMeta, Headers, MapRouter, Procedure, ResponseWriter, UnaryHandler};
    use crate::serialization::{decode_headers, encode_headers};
    use crate::transport::translate::{
        APPLICATION_ERROR_NAME_HEADER, CALLER_PROCEDURE_HEADER, ERROR_CODE_HEADER,
    };
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::time::Instant;

    struct Echo;

    #[async_trait]
    impl UnaryHandler for Echo {
        async fn handle(
            &self,
            ctx: &CallContext,
            request: Request,
            response: &mut dyn ResponseWriter,
        ) -> Result<(), RpcError> {
            let mut headers = request.headers.clone();
            if let Some(caller_procedure) = &request.caller_procedure {
                headers.set("x-caller-procedure", caller_procedure.as_str());
            }
            if let Some(span) = ctx.baggage().get("span") {
                headers.set("x-span", span.as_str());
            }
            headers.set("$rpc$-service", "spoofed");
            response.add_headers(headers);
            response.write(&request.body)
        }
    }

    struct Conflict {
        raise: bool,
    }

    #[async_trait]
    impl UnaryHandler for Conflict {
        async fn handle(
            &self,
            _ctx: &CallContext,
            _request: Request,
            response: &mut dyn ResponseWriter,
        ) -> Result<(), RpcError> {
            response.set_application_error_meta(ApplicationErrorMeta {
                name: Some("Conflict".into()),
                ..ApplicationErrorMeta::default()
            });
            if self.raise {
                return Err(RpcError::new(Code::Aborted, "version mismatch"));
            }
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl UnaryHandler for Broken {
        async fn handle(
            &self,
            _ctx: &CallContext,
            _request: Request,
            _response: &mut dyn ResponseWriter,
        ) -> Result<(), RpcError> {
            Err(RpcError::unavailable("database down"))
        }
    }

    fn dispatcher() -> (DispatchHandler, Arc<TransportMetrics>) {
        let router = MapRouter::new("kv")
            .with(Procedure::new("kv", "echo", Encoding::RAW), Arc::new(Echo))
            .with(
                Procedure::new("kv", "conflict", Encoding::RAW),
                Arc::new(Conflict { raise: false }),
            )
            .with(
                Procedure::new("kv", "abort", Encoding::RAW),
                Arc::new(Conflict { raise: true }),
            )
            .with(Procedure::new("kv", "broken", Encoding::RAW), Arc::new(Broken));
        let metrics = Arc::new(TransportMetrics::new());
        let handler = DispatchHandler::new(Arc::new(router), HeaderCase::Canonical, Arc::clone(&metrics));
        (handler, metrics)
    }

    fn call(procedure: &str, headers: &Headers) -> InboundCall {
        InboundCall {
            service: "kv".into(),
            procedure: procedure.into(),
            headers: TransportHeaders {
                format: "raw".into(),
                caller_name: "client".into(),
                ..TransportHeaders::default()
            },
            arg2: encode_headers(headers, HeaderCase::Canonical).unwrap(),
            arg3: Bytes::from_static(b"payload"),
            deadline: Instant::now() + Duration::from_secs(1),
            remote_host_port: "127.0.0.1:1234".into(),
        }
    }

    #[tokio::test]
    async fn test_echo_response() {
        let (handler, metrics) = dispatcher();
        let headers = Headers::new()
            .with("x-app", "1")
            .with(CALLER_PROCEDURE_HEADER, "upstream")
            .with("$tracing$span", "42");
        let response = handler.handle(call("echo", &headers)).await.unwrap();

        assert_eq!(response.code, ResponseCode::Ok);
        assert_eq!(response.arg3, Bytes::from_static(b"payload"));
        let headers = decode_headers(&response.arg2).unwrap();
        assert_eq!(headers.get("x-app"), Some("1"));
        assert_eq!(headers.get("x-caller-procedure"), Some("upstream"));
        assert_eq!(headers.get("x-span"), Some("42"));
        assert_eq!(headers.get(SERVICE_HEADER), Some("kv"));
        assert_eq!(headers.get(CALLER_PROCEDURE_HEADER), None);
        assert_eq!(metrics.inbound_calls(), 1);
        assert_eq!(metrics.inbound_failures(), 0);
    }

    #[tokio::test]
    async fn test_unknown_procedure_is_bad_request() {
        let (handler, metrics) = dispatcher();
        let err = handler.handle(call("missing", &Headers::new())).await.unwrap_err();
        assert_eq!(err.code, SystemErrorCode::BadRequest);
        assert!(err.message.contains("unknown method"));
        assert_eq!(metrics.inbound_failures(), 1);
    }

    #[tokio::test]
    async fn test_missing_caller_is_bad_request() {
        let (handler, _) = dispatcher();
        let mut call = call("echo", &Headers::new());
        call.headers.caller_name.clear();
        let err = handler.handle(call).await.unwrap_err();
        assert_eq!(err.code, SystemErrorCode::BadRequest);
        assert!(err.message.contains("caller name"));
    }

    #[tokio::test]
    async fn test_application_error_flag() {
        let (handler, _) = dispatcher();
        let response = handler.handle(call("conflict", &Headers::new())).await.unwrap();
        assert_eq!(response.code, ResponseCode::ApplicationError);
        let headers = decode_headers(&response.arg2).unwrap();
        assert_eq!(headers.get(APPLICATION_ERROR_NAME_HEADER), Some("Conflict"));
        assert_eq!(headers.get(ERROR_CODE_HEADER), None);
    }

    #[tokio::test]
    async fn test_application_error_with_returned_error() {
        let (handler, _) = dispatcher();
        let response = handler.handle(call("abort", &Headers::new())).await.unwrap();
        assert_eq!(response.code, ResponseCode::ApplicationError);
        let headers = decode_headers(&response.arg2).unwrap();
        assert_eq!(headers.get(ERROR_CODE_HEADER), Some("aborted"));
    }

    #[tokio::test]
    async fn test_handler_error_maps_to_system_code() {
        let (handler, _) = dispatcher();
        let err = handler.handle(call("broken", &Headers::new())).await.unwrap_err();
        assert_eq!(err.code, SystemErrorCode::Declined);
        assert_eq!(err.message, "database down");
    }

    #[tokio::test]
    async fn test_undecodable_headers() {
        let (handler, _) = dispatcher();
        let mut call = call("echo", &Headers::new());
        call.arg2 = Bytes::from_static(&[0x00, 0x01, 0x00]);
        let err = handler.handle(call).await.unwrap_err();
        assert_eq!(err.code, SystemErrorCode::BadRequest);
    }
}
