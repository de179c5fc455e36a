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

//! Translation between the wire protocol and the transport-agnostic model.
//!
//! This is the only place channel errors and system error codes become
//! [`RpcError`]s, and where reserved headers are added to and removed from
//! application headers.

use super::ReservedHeaderPolicy;
use crate::channel::ChannelError;
use crate::error::{Code, RpcError};
use crate::observability::TransportMetrics;
use crate::rpc::{ApplicationErrorMeta, CallContext, Headers, Request};
use crate::serialization::{ErrorMessage, SystemErrorCode};
use parking_lot::RwLock;
use std::collections::HashMap;

#[cfg(feature = "observability")]
use tracing::debug;

/// Prefix shared by all reserved header keys.
pub const RESERVED_PREFIX: &str = "$rpc$-";
/// Service that produced a response.
pub const SERVICE_HEADER: &str = "$rpc$-service";
/// Code of an error returned by a handler.
pub const ERROR_CODE_HEADER: &str = "$rpc$-error-code";
/// Name of an error returned by a handler.
pub const ERROR_NAME_HEADER: &str = "$rpc$-error-name";
/// Message of an error returned by a handler.
pub const ERROR_MESSAGE_HEADER: &str = "$rpc$-error-message";
/// Name of an application error.
pub const APPLICATION_ERROR_NAME_HEADER: &str = "$rpc$-application-error-name";
/// Details of an application error.
pub const APPLICATION_ERROR_DETAILS_HEADER: &str = "$rpc$-application-error-details";
/// Code of an application error.
pub const APPLICATION_ERROR_CODE_HEADER: &str = "$rpc$-application-error-code";
/// Procedure the caller was serving when it made the call.
pub const CALLER_PROCEDURE_HEADER: &str = "$rpc$-caller-procedure";
/// Prefix of headers carrying tracing baggage.
pub const TRACING_PREFIX: &str = "$tracing$";

fn has_prefix_ignore_case(key: &str, prefix: &str) -> bool {
    key.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Returns `true` for keys the transport reserves for itself.
///
/// ```rust
/// use tchannel_transport::transport::is_reserved;
///
/// assert!(is_reserved("$RPC$-Service"));
/// assert!(!is_reserved("x-request-id"));
/// ```
pub fn is_reserved(key: &str) -> bool {
    has_prefix_ignore_case(key, RESERVED_PREFIX)
}

fn is_internal(key: &str) -> bool {
    is_reserved(key) || has_prefix_ignore_case(key, TRACING_PREFIX)
}

/// Maps a wire system error code to an error code.
pub fn from_system_code(code: SystemErrorCode) -> Code {
    match code {
        SystemErrorCode::Timeout => Code::DeadlineExceeded,
        SystemErrorCode::Cancelled => Code::Cancelled,
        SystemErrorCode::Busy => Code::ResourceExhausted,
        SystemErrorCode::Declined => Code::Unavailable,
        SystemErrorCode::Unexpected => Code::Internal,
        SystemErrorCode::BadRequest => Code::InvalidArgument,
        SystemErrorCode::NetworkError => Code::Unavailable,
        SystemErrorCode::ProtocolError => Code::Internal,
        SystemErrorCode::Other(_) => Code::Unknown,
    }
}

/// Maps an error code to the wire system error code it travels as.
pub fn to_system_code(code: Code) -> SystemErrorCode {
    match code {
        Code::Cancelled => SystemErrorCode::Cancelled,
        Code::InvalidArgument | Code::Unimplemented => SystemErrorCode::BadRequest,
        Code::DeadlineExceeded => SystemErrorCode::Timeout,
        Code::Internal => SystemErrorCode::Unexpected,
        Code::Unavailable => SystemErrorCode::Declined,
        Code::ResourceExhausted => SystemErrorCode::Busy,
        _ => SystemErrorCode::Unexpected,
    }
}

/// Builds the error frame a failed inbound call is answered with.
pub(crate) fn to_error_message(err: &RpcError) -> ErrorMessage {
    ErrorMessage::new(to_system_code(err.code()), err.message())
}

/// Who called what, for error messages.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallIdentity<'a> {
    pub(crate) caller: &'a str,
    pub(crate) service: &'a str,
    pub(crate) procedure: &'a str,
}

impl<'a> From<&'a Request> for CallIdentity<'a> {
    fn from(request: &'a Request) -> Self {
        Self {
            caller: &request.caller,
            service: &request.service,
            procedure: &request.procedure,
        }
    }
}

/// Translates a channel failure for the caller of an outbound call.
pub(crate) fn channel_error(err: ChannelError, call: CallIdentity<'_>) -> RpcError {
    match err {
        ChannelError::System { code, message } => RpcError::new(from_system_code(code), message),
        ChannelError::Timeout { .. } => deadline_exceeded(call),
        other => RpcError::unknown(format!(
            "received unknown error calling procedure {:?} of service {:?}: {other}",
            call.procedure, call.service
        )),
    }
}

/// The error for a call whose deadline passed while it was on the wire.
pub(crate) fn deadline_exceeded(call: CallIdentity<'_>) -> RpcError {
    RpcError::deadline_exceeded(format!(
        "call to procedure {:?} of service {:?} from caller {:?} timed out",
        call.procedure, call.service, call.caller
    ))
}

/// Removes reserved and tracing headers, returning how many were removed.
pub(crate) fn strip_reserved(headers: &mut Headers) -> usize {
    headers.retain(|key, _| !is_internal(key))
}

/// Application headers for an outbound request, with caller procedure and
/// tracing baggage folded in.
///
/// # Errors
///
/// Under [`ReservedHeaderPolicy::Enforce`], any reserved key in the
/// request's own headers is an invalid-argument error.
pub(crate) fn outbound_headers(
    request: &Request,
    ctx: &CallContext,
    policy: ReservedHeaderPolicy,
    tracing_keys: &TracingKeyCache,
    metrics: &TransportMetrics,
) -> Result<Headers, RpcError> {
    let mut headers = request.headers.clone();

    let reserved = headers
        .iter()
        .find(|(key, _)| is_internal(key))
        .map(|(key, _)| key.to_string());
    if let Some(key) = reserved {
        if policy == ReservedHeaderPolicy::Enforce {
            return Err(RpcError::invalid_argument(format!(
                "cannot use reserved header key {key:?} in request to procedure {:?} of service {:?}",
                request.procedure, request.service
            )));
        }
        let stripped = strip_reserved(&mut headers);
        metrics.record_reserved_headers_stripped(stripped as u64);

        #[cfg(feature = "observability")]
        debug!(
            service = %request.service,
            procedure = %request.procedure,
            stripped,
            "Dropped reserved application headers"
        );
    }

    if let Some(caller_procedure) = request.caller_procedure.as_deref() {
        headers.set(CALLER_PROCEDURE_HEADER, caller_procedure);
    }
    for (key, value) in ctx.baggage() {
        headers.set(tracing_keys.to_wire(key), value.as_str());
    }
    Ok(headers)
}

/// Application headers split from the metadata an inbound request carries.
#[derive(Debug, Default)]
pub(crate) struct InboundHeaders {
    pub(crate) headers: Headers,
    pub(crate) caller_procedure: Option<String>,
    pub(crate) baggage: Vec<(String, String)>,
}

/// Separates reserved and tracing headers from application headers.
pub(crate) fn inbound_headers(mut headers: Headers) -> InboundHeaders {
    let caller_procedure = headers.remove(CALLER_PROCEDURE_HEADER);
    let baggage = headers
        .iter()
        .filter_map(|(key, value)| {
            TracingKeyCache::from_wire(key).map(|key| (key.to_string(), value.to_string()))
        })
        .collect();
    strip_reserved(&mut headers);
    InboundHeaders {
        headers,
        caller_procedure,
        baggage,
    }
}

/// Reads application error metadata from response headers.
pub(crate) fn application_error_meta(headers: &Headers) -> Option<ApplicationErrorMeta> {
    let meta = ApplicationErrorMeta {
        name: headers.get(APPLICATION_ERROR_NAME_HEADER).map(str::to_string),
        details: headers
            .get(APPLICATION_ERROR_DETAILS_HEADER)
            .map(str::to_string),
        code: headers
            .get(APPLICATION_ERROR_CODE_HEADER)
            .and_then(|code| code.parse().ok()),
    };
    (meta.name.is_some() || meta.details.is_some() || meta.code.is_some()).then_some(meta)
}

/// Writes application error metadata into response headers.
pub(crate) fn write_application_error_meta(headers: &mut Headers, meta: &ApplicationErrorMeta) {
    if let Some(name) = &meta.name {
        headers.set(APPLICATION_ERROR_NAME_HEADER, name.as_str());
    }
    if let Some(details) = &meta.details {
        headers.set(APPLICATION_ERROR_DETAILS_HEADER, details.as_str());
    }
    if let Some(code) = meta.code {
        headers.set(APPLICATION_ERROR_CODE_HEADER, code.as_str());
    }
}

/// Writes a handler error into response headers.
pub(crate) fn write_error(headers: &mut Headers, err: &RpcError) {
    headers.set(ERROR_CODE_HEADER, err.code().as_str());
    if let Some(name) = err.name() {
        headers.set(ERROR_NAME_HEADER, name);
    }
    headers.set(ERROR_MESSAGE_HEADER, err.message());
}

/// Reads a handler error from response headers, if one was written.
pub(crate) fn read_error(headers: &Headers) -> Option<RpcError> {
    let code = headers.get(ERROR_CODE_HEADER)?;
    let code = code.parse().unwrap_or(Code::Unknown);
    let message = headers.get(ERROR_MESSAGE_HEADER).unwrap_or_default();
    let err = RpcError::new(code, message);
    Some(match headers.get(ERROR_NAME_HEADER) {
        Some(name) => err.with_name(name),
        None => err,
    })
}

/// Maps baggage keys to their wire form.
///
/// Owned by a transport; lookups take a read lock and only a miss takes the
/// write lock.
#[derive(Debug, Default)]
pub struct TracingKeyCache {
    keys: RwLock<HashMap<String, String>>,
}

impl TracingKeyCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the header key that carries baggage `key`.
    ///
    /// ```rust
    /// use tchannel_transport::transport::TracingKeyCache;
    ///
    /// let cache = TracingKeyCache::new();
    /// assert_eq!(cache.to_wire("span-id"), "$tracing$span-id");
    /// ```
    pub fn to_wire(&self, key: &str) -> String {
        if let Some(wire) = self.keys.read().get(key) {
            return wire.clone();
        }
        self.keys
            .write()
            .entry(key.to_string())
            .or_insert_with(|| format!("{TRACING_PREFIX}{key}"))
            .clone()
    }

    /// Returns the baggage key a header carries, if it is a tracing header.
    pub fn from_wire(key: &str) -> Option<&str> {
        if has_prefix_ignore_case(key, TRACING_PREFIX) {
            key.get(TRACING_PREFIX.len()..)
        } else {
            None
        }
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// Returns `true` if nothing has been cached.
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_system_code_mapping() {
        assert_eq!(from_system_code(SystemErrorCode::Timeout), Code::DeadlineExceeded);
        assert_eq!(from_system_code(SystemErrorCode::BadRequest), Code::InvalidArgument);
        assert_eq!(from_system_code(SystemErrorCode::Busy), Code::ResourceExhausted);
        assert_eq!(from_system_code(SystemErrorCode::Declined), Code::Unavailable);
        assert_eq!(from_system_code(SystemErrorCode::Other(0x42)), Code::Unknown);

        assert_eq!(to_system_code(Code::Unimplemented), SystemErrorCode::BadRequest);
        assert_eq!(to_system_code(Code::DeadlineExceeded), SystemErrorCode::Timeout);
        assert_eq!(to_system_code(Code::NotFound), SystemErrorCode::Unexpected);
        assert_eq!(to_system_code(Code::Unavailable), SystemErrorCode::Declined);
    }

    #[test]
    fn test_codes_survive_the_wire_where_mapped() {
        for code in [
            Code::Cancelled,
            Code::InvalidArgument,
            Code::DeadlineExceeded,
            Code::Internal,
            Code::Unavailable,
            Code::ResourceExhausted,
        ] {
            assert_eq!(from_system_code(to_system_code(code)), code);
        }
    }

    #[test]
    fn test_channel_error_translation() {
        let call = CallIdentity {
            caller: "caller",
            service: "svc",
            procedure: "proc",
        };

        let err = channel_error(
            ChannelError::System {
                code: SystemErrorCode::BadRequest,
                message: "unknown method".into(),
            },
            call,
        );
        assert_eq!(err.code(), Code::InvalidArgument);
        assert_eq!(err.message(), "unknown method");

        let err = channel_error(ChannelError::Timeout { operation: "call response" }, call);
        assert_eq!(err.code(), Code::DeadlineExceeded);
        assert_eq!(
            err.message(),
            r#"call to procedure "proc" of service "svc" from caller "caller" timed out"#
        );

        let err = channel_error(ChannelError::Closed, call);
        assert_eq!(err.code(), Code::Unknown);
        assert!(err.message().contains(r#"procedure "proc" of service "svc""#));
    }

    #[test]
    fn test_outbound_headers_lenient_strips() {
        let request = Request::new("svc", "proc")
            .with_header("$rpc$-service", "spoofed")
            .with_header("x-app", "1")
            .with_caller_procedure("caller::proc");
        let ctx = CallContext::with_timeout(Duration::from_secs(1)).with_baggage("span", "7");
        let metrics = TransportMetrics::new();
        let cache = TracingKeyCache::new();

        let headers = outbound_headers(
            &request,
            &ctx,
            ReservedHeaderPolicy::Lenient,
            &cache,
            &metrics,
        )
        .unwrap();
        assert_eq!(headers.get(SERVICE_HEADER), None);
        assert_eq!(headers.get("x-app"), Some("1"));
        assert_eq!(headers.get(CALLER_PROCEDURE_HEADER), Some("caller::proc"));
        assert_eq!(headers.get("$tracing$span"), Some("7"));
        assert_eq!(metrics.reserved_headers_stripped(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_outbound_headers_enforce_rejects() {
        let request = Request::new("svc", "proc").with_header("$RPC$-Error-Code", "x");
        let err = outbound_headers(
            &request,
            &CallContext::new(),
            ReservedHeaderPolicy::Enforce,
            &TracingKeyCache::new(),
            &TransportMetrics::new(),
        )
        .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[test]
    fn test_inbound_headers_split() {
        let headers = Headers::new()
            .with("x-app", "1")
            .with(CALLER_PROCEDURE_HEADER, "upstream")
            .with("$tracing$span", "7")
            .with("$rpc$-whatever", "hidden");
        let split = inbound_headers(headers);
        assert_eq!(split.headers, Headers::new().with("x-app", "1"));
        assert_eq!(split.caller_procedure.as_deref(), Some("upstream"));
        assert_eq!(split.baggage, [("span".to_string(), "7".to_string())]);
    }

    #[test]
    fn test_error_headers() {
        let mut headers = Headers::new();
        write_error(
            &mut headers,
            &RpcError::not_found("no such key").with_name("KeyMissing"),
        );
        let err = read_error(&headers).unwrap();
        assert_eq!(err.code(), Code::NotFound);
        assert_eq!(err.name(), Some("KeyMissing"));
        assert_eq!(err.message(), "no such key");
        assert!(read_error(&Headers::new()).is_none());
    }

    #[test]
    fn test_application_error_meta() {
        let meta = ApplicationErrorMeta {
            name: Some("Conflict".into()),
            details: Some("version mismatch".into()),
            code: Some(Code::Aborted),
        };
        let mut headers = Headers::new();
        write_application_error_meta(&mut headers, &meta);
        assert_eq!(application_error_meta(&headers), Some(meta));
        assert_eq!(application_error_meta(&Headers::new()), None);
    }
}
