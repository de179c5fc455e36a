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

//! Codec error types.

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Error produced while encoding or decoding wire data.
///
/// Cloneable so that one failure can be fanned out to every call waiting on a
/// connection; I/O sources are shared behind an [`Arc`].
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Input ended before a complete value was read.
    #[error("unexpected end of input while reading {context}")]
    Truncated {
        /// What was being read
        context: &'static str,
    },

    /// A value is too long for its length prefix.
    #[error("{context} of {len} bytes exceeds the {max} byte limit")]
    TooLong {
        /// What was being written
        context: &'static str,
        /// Actual length
        len: usize,
        /// Maximum the length prefix allows
        max: usize,
    },

    /// Bytes were left over after a complete value was read.
    #[error("{count} trailing bytes after {context}")]
    TrailingBytes {
        /// What was being read
        context: &'static str,
        /// Number of unread bytes
        count: usize,
    },

    /// A frame exceeds [`MAX_FRAME_SIZE`](super::MAX_FRAME_SIZE).
    #[error("frame of {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge {
        /// Declared frame size
        size: usize,
        /// Maximum accepted size
        max: usize,
    },

    /// A string field is not UTF-8.
    #[error("{context} is not valid UTF-8")]
    InvalidUtf8 {
        /// Which field
        context: &'static str,
    },

    /// Unrecognized frame type byte.
    #[error("unknown message type 0x{0:02x}")]
    UnknownMessageType(u8),

    /// Unrecognized call response code byte.
    #[error("invalid call response code 0x{0:02x}")]
    InvalidResponseCode(u8),

    /// The peer speaks a protocol version this codec does not.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u16),

    /// The same header key appears more than once, ignoring ASCII case.
    #[error("duplicate header key {key:?}")]
    DuplicateHeader {
        /// The repeated key as it appeared on the wire
        key: String,
    },

    /// A required field is absent.
    #[error("missing required field {0}")]
    MissingField(&'static str),

    /// JSON header encoding or decoding failed.
    #[error("invalid JSON headers: {source}")]
    Json {
        /// Underlying serde error
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// Reading from or writing to the stream failed.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[source]
        source: Arc<io::Error>,
    },
}

impl From<io::Error> for CodecError {
    fn from(source: io::Error) -> Self {
        CodecError::Io {
            source: Arc::new(source),
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(source: serde_json::Error) -> Self {
        CodecError::Json {
            source: Arc::new(source),
        }
    }
}
