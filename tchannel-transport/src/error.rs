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

//! Transport-agnostic error taxonomy.
//!
//! Every failure that crosses the public call boundary is an [`RpcError`]
//! carrying a [`Code`]. Lower layers ([`ChannelError`](crate::channel::ChannelError),
//! [`CodecError`](crate::serialization::CodecError)) keep their own structured
//! errors; the transport layer is the only place they are translated into this
//! space.
//!
//! # Error Categories
//!
//! - **Contract errors**: [`Code::InvalidArgument`], [`Code::FailedPrecondition`],
//!   [`Code::NotFound`] for malformed requests or misuse of the API
//! - **Transient errors**: [`Code::Unavailable`], [`Code::ResourceExhausted`],
//!   [`Code::DeadlineExceeded`] which callers (or their middleware) may retry
//! - **Remote failures**: [`Code::Internal`], [`Code::Unknown`] for everything the
//!   remote side could not express more precisely

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Status codes shared by every transport.
///
/// The string forms (`"deadline-exceeded"`, `"invalid-argument"`, ...) are what
/// travels in the reserved `$rpc$-error-code` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    /// The operation was cancelled, typically by the caller.
    Cancelled,
    /// An error with no better classification.
    Unknown,
    /// The caller supplied an invalid request.
    InvalidArgument,
    /// The deadline expired before the operation could complete.
    DeadlineExceeded,
    /// A requested entity was not found.
    NotFound,
    /// The entity a caller attempted to create already exists.
    AlreadyExists,
    /// The caller is not permitted to perform the operation.
    PermissionDenied,
    /// A resource (quota, capacity, connection slots) has been exhausted.
    ResourceExhausted,
    /// The system is not in a state required for the operation.
    FailedPrecondition,
    /// The operation was aborted.
    Aborted,
    /// The operation was attempted past the valid range.
    OutOfRange,
    /// The operation is not implemented or not supported.
    Unimplemented,
    /// An internal invariant was broken.
    Internal,
    /// The service is currently unavailable.
    Unavailable,
    /// Unrecoverable data loss or corruption.
    DataLoss,
    /// The request lacks valid authentication credentials.
    Unauthenticated,
}

impl Code {
    /// Every code, in declaration order.
    pub const ALL: [Code; 16] = [
        Code::Cancelled,
        Code::Unknown,
        Code::InvalidArgument,
        Code::DeadlineExceeded,
        Code::NotFound,
        Code::AlreadyExists,
        Code::PermissionDenied,
        Code::ResourceExhausted,
        Code::FailedPrecondition,
        Code::Aborted,
        Code::OutOfRange,
        Code::Unimplemented,
        Code::Internal,
        Code::Unavailable,
        Code::DataLoss,
        Code::Unauthenticated,
    ];

    /// Returns the wire name of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::Cancelled => "cancelled",
            Code::Unknown => "unknown",
            Code::InvalidArgument => "invalid-argument",
            Code::DeadlineExceeded => "deadline-exceeded",
            Code::NotFound => "not-found",
            Code::AlreadyExists => "already-exists",
            Code::PermissionDenied => "permission-denied",
            Code::ResourceExhausted => "resource-exhausted",
            Code::FailedPrecondition => "failed-precondition",
            Code::Aborted => "aborted",
            Code::OutOfRange => "out-of-range",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal",
            Code::Unavailable => "unavailable",
            Code::DataLoss => "data-loss",
            Code::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a [`Code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown error code {0:?}")]
pub struct ParseCodeError(String);

impl FromStr for Code {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Code::ALL
            .iter()
            .copied()
            .find(|code| code.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseCodeError(s.to_string()))
    }
}

/// A failed RPC, described independently of the wire protocol that carried it.
///
/// # Examples
///
/// ```rust
/// use tchannel_transport::error::{Code, RpcError};
///
/// let err = RpcError::invalid_argument("missing service name");
/// assert_eq!(err.code(), Code::InvalidArgument);
/// assert_eq!(err.to_string(), "code:invalid-argument message:missing service name");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    code: Code,
    name: Option<String>,
    message: String,
}

impl RpcError {
    /// Creates an error with the given code and message.
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            name: None,
            message: message.into(),
        }
    }

    /// Attaches an application-defined error name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Creates a [`Code::Cancelled`] error.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(Code::Cancelled, message)
    }

    /// Creates a [`Code::Unknown`] error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(Code::Unknown, message)
    }

    /// Creates a [`Code::InvalidArgument`] error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    /// Creates a [`Code::DeadlineExceeded`] error.
    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(Code::DeadlineExceeded, message)
    }

    /// Creates a [`Code::NotFound`] error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    /// Creates a [`Code::FailedPrecondition`] error.
    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(Code::FailedPrecondition, message)
    }

    /// Creates a [`Code::Unimplemented`] error.
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented, message)
    }

    /// Creates a [`Code::Internal`] error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    /// Creates a [`Code::Unavailable`] error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    /// Returns the status code.
    pub fn code(&self) -> Code {
        self.code
    }

    /// Returns the application-defined error name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the human readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(
                f,
                "code:{} name:{} message:{}",
                self.code, name, self.message
            ),
            None => write!(f, "code:{} message:{}", self.code, self.message),
        }
    }
}

impl std::error::Error for RpcError {}
