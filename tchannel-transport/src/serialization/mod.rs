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

//! Wire codec for the multiplexed call protocol.
//!
//! # Overview
//!
//! - **[`framing`]**: the frame envelope every message travels in
//! - **[`headers`]**: application header codecs (binary and JSON)
//! - **[`messages`]**: bodies of init, call, and error messages
//! - **[`CodecError`]**: everything that can go wrong decoding or encoding
//!
//! # Frame Layout
//!
//! ```text
//! +-----------------+---------------+---------------+----------------------+
//! | Size (4 bytes)  | Type (1 byte) | Id (4 bytes)  | Payload (Size-5)     |
//! +-----------------+---------------+---------------+----------------------+
//! ```
//!
//! All integers are big-endian. `Size` covers type, id and payload. Calls are
//! multiplexed over one connection by `Id`; a response or error frame carries
//! the id of the request it answers.
//!
//! # Header Layout
//!
//! ```text
//! [u16 count] { [u16 key_len] key [u16 value_len] value } * count
//! ```
//!
//! An empty header set is the two bytes `00 00`. Requests using the JSON
//! format carry headers as a JSON object instead, where the empty set is `{}`.

mod buf;
mod error;
pub mod framing;
pub mod headers;
pub mod messages;

pub use self::error::CodecError;
pub use self::framing::{Frame, MAX_FRAME_SIZE, MessageType, read_frame, write_frame};
pub use self::headers::{
    HeaderFormat, decode_headers, decode_json_headers, encode_headers, encode_json_headers,
};
pub use self::messages::{
    CallRequest, CallResponse, ErrorMessage, InitMessage, PROTOCOL_VERSION, ResponseCode,
    SystemErrorCode, TransportHeaders,
};
