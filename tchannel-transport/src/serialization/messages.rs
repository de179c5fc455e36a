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

//! Message bodies carried inside [`Frame`](super::Frame)s.
//!
//! # Layouts
//!
//! ```text
//! init:          [u16 version] [u16 nh] { [u16] key [u16] value } * nh
//! call request:  [u32 ttl_ms] [u8 nh] { [u8] key [u8] value } * nh
//!                [u16] service [u16] arg1 [u32] arg2 [u32] arg3
//! call response: [u8 code] [u8 nh] { [u8] key [u8] value } * nh
//!                [u32] arg2 [u32] arg3
//! error:         [u8 code] [u16] message
//! ```
//!
//! `arg1` is the procedure name, `arg2` the encoded application headers and
//! `arg3` the body.

use super::CodecError;
use super::buf::{
    get_bytes32, get_str8, get_str16, get_u8, get_u16, get_u32, put_bytes32, put_count16,
    put_str8, put_str16,
};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::time::Duration;

/// Protocol version spoken in the init handshake.
pub const PROTOCOL_VERSION: u16 = 2;

const HOST_PORT_KEY: &str = "host_port";
const PROCESS_NAME_KEY: &str = "process_name";

const FORMAT_KEY: &str = "as";
const CALLER_NAME_KEY: &str = "cn";
const SHARD_KEY_KEY: &str = "sk";
const ROUTING_KEY_KEY: &str = "rk";
const ROUTING_DELEGATE_KEY: &str = "rd";

/// Codes carried by error frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemErrorCode {
    /// The call's TTL elapsed.
    Timeout,
    /// The caller cancelled the call.
    Cancelled,
    /// The callee is overloaded.
    Busy,
    /// The callee refused the call.
    Declined,
    /// The callee failed unexpectedly.
    Unexpected,
    /// The request was malformed.
    BadRequest,
    /// A network failure prevented the call.
    NetworkError,
    /// The connection is in an unrecoverable protocol state.
    ProtocolError,
    /// Any code this codec does not recognize.
    Other(u8),
}

impl SystemErrorCode {
    /// The code byte.
    pub fn as_u8(self) -> u8 {
        match self {
            SystemErrorCode::Timeout => 0x01,
            SystemErrorCode::Cancelled => 0x02,
            SystemErrorCode::Busy => 0x03,
            SystemErrorCode::Declined => 0x04,
            SystemErrorCode::Unexpected => 0x05,
            SystemErrorCode::BadRequest => 0x06,
            SystemErrorCode::NetworkError => 0x07,
            SystemErrorCode::ProtocolError => 0xff,
            SystemErrorCode::Other(code) => code,
        }
    }

    /// Parses a code byte.
    pub fn from_u8(code: u8) -> Self {
        match code {
            0x01 => SystemErrorCode::Timeout,
            0x02 => SystemErrorCode::Cancelled,
            0x03 => SystemErrorCode::Busy,
            0x04 => SystemErrorCode::Declined,
            0x05 => SystemErrorCode::Unexpected,
            0x06 => SystemErrorCode::BadRequest,
            0x07 => SystemErrorCode::NetworkError,
            0xff => SystemErrorCode::ProtocolError,
            other => SystemErrorCode::Other(other),
        }
    }
}

impl fmt::Display for SystemErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemErrorCode::Timeout => f.write_str("timeout"),
            SystemErrorCode::Cancelled => f.write_str("cancelled"),
            SystemErrorCode::Busy => f.write_str("busy"),
            SystemErrorCode::Declined => f.write_str("declined"),
            SystemErrorCode::Unexpected => f.write_str("unexpected error"),
            SystemErrorCode::BadRequest => f.write_str("bad request"),
            SystemErrorCode::NetworkError => f.write_str("network error"),
            SystemErrorCode::ProtocolError => f.write_str("protocol error"),
            SystemErrorCode::Other(code) => write!(f, "system error 0x{code:02x}"),
        }
    }
}

/// Connection handshake body, used for both init request and response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitMessage {
    /// Protocol version.
    pub version: u16,
    /// Address the sender accepts connections on, `0.0.0.0:0` if none.
    pub host_port: String,
    /// Free-form process description.
    pub process_name: String,
}

impl InitMessage {
    /// Creates an init body for the current protocol version.
    pub fn new(host_port: impl Into<String>, process_name: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            host_port: host_port.into(),
            process_name: process_name.into(),
        }
    }

    /// Encodes the body.
    ///
    /// # Errors
    ///
    /// Fails if a value exceeds its length prefix.
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::new();
        buf.put_u16(self.version);
        put_count16(&mut buf, 2, "init header count")?;
        put_str16(&mut buf, HOST_PORT_KEY, "init header key")?;
        put_str16(&mut buf, &self.host_port, "host_port")?;
        put_str16(&mut buf, PROCESS_NAME_KEY, "init header key")?;
        put_str16(&mut buf, &self.process_name, "process_name")?;
        Ok(buf.freeze())
    }

    /// Decodes the body. Unknown init headers are ignored.
    ///
    /// # Errors
    ///
    /// Fails on truncated input, a version other than [`PROTOCOL_VERSION`], or
    /// a missing `host_port`.
    pub fn decode(mut buf: Bytes) -> Result<Self, CodecError> {
        let version = get_u16(&mut buf, "init version")?;
        if version != PROTOCOL_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        let count = get_u16(&mut buf, "init header count")?;
        let mut host_port = None;
        let mut process_name = String::new();
        for _ in 0..count {
            let key = get_str16(&mut buf, "init header key")?;
            let value = get_str16(&mut buf, "init header value")?;
            match key.as_str() {
                HOST_PORT_KEY => host_port = Some(value),
                PROCESS_NAME_KEY => process_name = value,
                _ => {}
            }
        }
        Ok(Self {
            version,
            host_port: host_port.ok_or(CodecError::MissingField(HOST_PORT_KEY))?,
            process_name,
        })
    }
}

/// Per-call transport headers.
///
/// These carry protocol routing metadata and are separate from the
/// application headers in `arg2`. Empty fields are not written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportHeaders {
    /// Wire format (`as`), e.g. `raw` or `json`.
    pub format: String,
    /// Name of the calling service (`cn`).
    pub caller_name: String,
    /// Shard key (`sk`).
    pub shard_key: String,
    /// Routing key (`rk`).
    pub routing_key: String,
    /// Routing delegate (`rd`).
    pub routing_delegate: String,
}

impl TransportHeaders {
    fn pairs(&self) -> [(&'static str, &str); 5] {
        [
            (FORMAT_KEY, &self.format),
            (CALLER_NAME_KEY, &self.caller_name),
            (SHARD_KEY_KEY, &self.shard_key),
            (ROUTING_KEY_KEY, &self.routing_key),
            (ROUTING_DELEGATE_KEY, &self.routing_delegate),
        ]
    }

    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let pairs = self.pairs();
        let present = pairs.iter().filter(|(_, value)| !value.is_empty());
        buf.put_u8(present.clone().count() as u8);
        for (key, value) in present {
            put_str8(buf, key, "transport header key")?;
            put_str8(buf, value, "transport header value")?;
        }
        Ok(())
    }

    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        let count = get_u8(buf, "transport header count")?;
        let mut headers = TransportHeaders::default();
        for _ in 0..count {
            let key = get_str8(buf, "transport header key")?;
            let value = get_str8(buf, "transport header value")?;
            match key.as_str() {
                FORMAT_KEY => headers.format = value,
                CALLER_NAME_KEY => headers.caller_name = value,
                SHARD_KEY_KEY => headers.shard_key = value,
                ROUTING_KEY_KEY => headers.routing_key = value,
                ROUTING_DELEGATE_KEY => headers.routing_delegate = value,
                _ => {}
            }
        }
        Ok(headers)
    }
}

/// Body of a call request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    /// Time the caller is willing to wait, at millisecond precision.
    pub ttl: Duration,
    /// Transport headers.
    pub headers: TransportHeaders,
    /// Service being called.
    pub service: String,
    /// Procedure being called (`arg1`).
    pub procedure: String,
    /// Encoded application headers (`arg2`).
    pub arg2: Bytes,
    /// Body (`arg3`).
    pub arg3: Bytes,
}

impl CallRequest {
    /// Encodes the body.
    ///
    /// # Errors
    ///
    /// Fails if a field exceeds its length prefix.
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(
            64 + self.service.len() + self.procedure.len() + self.arg2.len() + self.arg3.len(),
        );
        let ttl_ms = u32::try_from(self.ttl.as_millis()).unwrap_or(u32::MAX);
        buf.put_u32(ttl_ms);
        self.headers.encode(&mut buf)?;
        put_str16(&mut buf, &self.service, "service")?;
        put_str16(&mut buf, &self.procedure, "arg1")?;
        put_bytes32(&mut buf, &self.arg2, "arg2")?;
        put_bytes32(&mut buf, &self.arg3, "arg3")?;
        Ok(buf.freeze())
    }

    /// Decodes the body.
    ///
    /// # Errors
    ///
    /// Fails on truncated input or non UTF-8 strings.
    pub fn decode(mut buf: Bytes) -> Result<Self, CodecError> {
        let ttl = Duration::from_millis(u64::from(get_u32(&mut buf, "ttl")?));
        let headers = TransportHeaders::decode(&mut buf)?;
        let service = get_str16(&mut buf, "service")?;
        let procedure = get_str16(&mut buf, "arg1")?;
        let arg2 = get_bytes32(&mut buf, "arg2")?;
        let arg3 = get_bytes32(&mut buf, "arg3")?;
        Ok(Self {
            ttl,
            headers,
            service,
            procedure,
            arg2,
            arg3,
        })
    }
}

/// Outcome flag of a call response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    /// The call succeeded.
    Ok,
    /// The callee flagged the response as an application error.
    ApplicationError,
}

/// Body of a call response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResponse {
    /// Outcome flag.
    pub code: ResponseCode,
    /// Transport headers.
    pub headers: TransportHeaders,
    /// Encoded application headers (`arg2`).
    pub arg2: Bytes,
    /// Body (`arg3`).
    pub arg3: Bytes,
}

impl CallResponse {
    /// Encodes the body.
    ///
    /// # Errors
    ///
    /// Fails if a field exceeds its length prefix.
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(32 + self.arg2.len() + self.arg3.len());
        buf.put_u8(match self.code {
            ResponseCode::Ok => 0x00,
            ResponseCode::ApplicationError => 0x01,
        });
        self.headers.encode(&mut buf)?;
        put_bytes32(&mut buf, &self.arg2, "arg2")?;
        put_bytes32(&mut buf, &self.arg3, "arg3")?;
        Ok(buf.freeze())
    }

    /// Decodes the body.
    ///
    /// # Errors
    ///
    /// Fails on truncated input or an unknown response code.
    pub fn decode(mut buf: Bytes) -> Result<Self, CodecError> {
        let code = match get_u8(&mut buf, "response code")? {
            0x00 => ResponseCode::Ok,
            0x01 => ResponseCode::ApplicationError,
            other => return Err(CodecError::InvalidResponseCode(other)),
        };
        let headers = TransportHeaders::decode(&mut buf)?;
        let arg2 = get_bytes32(&mut buf, "arg2")?;
        let arg3 = get_bytes32(&mut buf, "arg3")?;
        Ok(Self {
            code,
            headers,
            arg2,
            arg3,
        })
    }
}

/// Body of an error frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    /// System error code.
    pub code: SystemErrorCode,
    /// Human readable description.
    pub message: String,
}

impl ErrorMessage {
    /// Creates an error body.
    pub fn new(code: SystemErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Encodes the body. Messages longer than the length prefix allows are
    /// truncated at a character boundary.
    pub fn encode(&self) -> Bytes {
        let mut end = self.message.len().min(u16::MAX as usize);
        while !self.message.is_char_boundary(end) {
            end -= 1;
        }
        let message = &self.message[..end];
        let mut buf = BytesMut::with_capacity(3 + message.len());
        buf.put_u8(self.code.as_u8());
        buf.put_u16(message.len() as u16);
        buf.put_slice(message.as_bytes());
        buf.freeze()
    }

    /// Decodes the body.
    ///
    /// # Errors
    ///
    /// Fails on truncated input or a non UTF-8 message.
    pub fn decode(mut buf: Bytes) -> Result<Self, CodecError> {
        let code = SystemErrorCode::from_u8(get_u8(&mut buf, "error code")?);
        let message = get_str16(&mut buf, "error message")?;
        Ok(Self { code, message })
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> CallRequest {
        CallRequest {
            ttl: Duration::from_millis(1500),
            headers: TransportHeaders {
                format: "json".into(),
                caller_name: "checkout".into(),
                shard_key: "user-42".into(),
                ..Default::default()
            },
            service: "billing".into(),
            procedure: "charge".into(),
            arg2: Bytes::from_static(b"{}"),
            arg3: Bytes::from_static(b"{\"cents\":100}"),
        }
    }

    #[test]
    fn test_call_request_decodes_what_it_encodes() {
        let request = sample_request();
        let decoded = CallRequest::decode(request.encode().unwrap()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_empty_transport_headers_are_omitted() {
        let request = CallRequest {
            headers: TransportHeaders::default(),
            ..sample_request()
        };
        let bytes = request.encode().unwrap();
        // ttl then a zero header count
        assert_eq!(&bytes[..5], &[0x00, 0x00, 0x05, 0xdc, 0x00]);
    }

    #[test]
    fn test_ttl_saturates() {
        let request = CallRequest {
            ttl: Duration::from_secs(u64::from(u32::MAX)),
            ..sample_request()
        };
        let decoded = CallRequest::decode(request.encode().unwrap()).unwrap();
        assert_eq!(decoded.ttl, Duration::from_millis(u64::from(u32::MAX)));
    }

    #[test]
    fn test_truncated_call_request() {
        let bytes = sample_request().encode().unwrap();
        let short = bytes.slice(..bytes.len() - 3);
        assert!(matches!(
            CallRequest::decode(short),
            Err(CodecError::Truncated { context: "arg3" })
        ));
    }

    #[test]
    fn test_call_response_application_error() {
        let response = CallResponse {
            code: ResponseCode::ApplicationError,
            headers: TransportHeaders {
                format: "raw".into(),
                ..Default::default()
            },
            arg2: Bytes::from_static(&[0, 0]),
            arg3: Bytes::from_static(b"nope"),
        };
        let decoded = CallResponse::decode(response.encode().unwrap()).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_invalid_response_code() {
        let bytes = Bytes::from_static(&[0x09, 0x00]);
        assert!(matches!(
            CallResponse::decode(bytes),
            Err(CodecError::InvalidResponseCode(0x09))
        ));
    }

    #[test]
    fn test_error_message() {
        let message = ErrorMessage::new(SystemErrorCode::BadRequest, "no handler");
        let bytes = message.encode();
        assert_eq!(bytes[0], 0x06);
        assert_eq!(ErrorMessage::decode(bytes).unwrap(), message);
        assert_eq!(message.to_string(), "bad request: no handler");
    }

    #[test]
    fn test_unknown_system_code_preserved() {
        let decoded = ErrorMessage::decode(Bytes::from_static(&[0x42, 0x00, 0x00])).unwrap();
        assert_eq!(decoded.code, SystemErrorCode::Other(0x42));
        assert_eq!(decoded.code.as_u8(), 0x42);
    }

    #[test]
    fn test_init_message() {
        let init = InitMessage::new("10.0.0.1:4040", "billing[123]");
        let decoded = InitMessage::decode(init.encode().unwrap()).unwrap();
        assert_eq!(decoded, init);
    }

    #[test]
    fn test_init_rejects_other_versions() {
        let bytes = Bytes::from_static(&[0x00, 0x01, 0x00, 0x00]);
        assert!(matches!(
            InitMessage::decode(bytes),
            Err(CodecError::UnsupportedVersion(1))
        ));
    }

    #[test]
    fn test_init_requires_host_port() {
        let bytes = Bytes::from_static(&[0x00, 0x02, 0x00, 0x00]);
        assert!(matches!(
            InitMessage::decode(bytes),
            Err(CodecError::MissingField("host_port"))
        ));
    }
}
