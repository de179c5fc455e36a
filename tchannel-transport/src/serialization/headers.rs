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

//! Application header codecs.
//!
//! Headers travel in the second call argument. The binary layout is
//!
//! ```text
//! [u16 count] { [u16 key_len] key [u16 value_len] value } * count
//! ```
//!
//! and the JSON format uses a flat JSON object of strings. An empty argument
//! decodes to an empty header set in both formats. Keys are case-insensitive,
//! so a block naming the same key twice in any spelling is rejected.

use super::CodecError;
use super::buf::{get_str16, get_u16, put_count16, put_str16};
use crate::rpc::{HeaderCase, Headers};
use bytes::{Bytes, BytesMut};
use std::collections::BTreeMap;

/// Which header codec a call uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderFormat {
    /// Length-prefixed binary pairs.
    Binary,
    /// A JSON object.
    Json,
}

impl HeaderFormat {
    /// Selects the codec for a wire format name: `json` uses JSON headers,
    /// everything else binary.
    pub fn for_format(format: &str) -> Self {
        if format.eq_ignore_ascii_case("json") {
            HeaderFormat::Json
        } else {
            HeaderFormat::Binary
        }
    }

    /// Encodes `headers` with this codec.
    ///
    /// # Errors
    ///
    /// See [`encode_headers`] and [`encode_json_headers`].
    pub fn encode(self, headers: &Headers, case: HeaderCase) -> Result<Bytes, CodecError> {
        match self {
            HeaderFormat::Binary => encode_headers(headers, case),
            HeaderFormat::Json => encode_json_headers(headers, case),
        }
    }

    /// Decodes headers with this codec.
    ///
    /// # Errors
    ///
    /// See [`decode_headers`] and [`decode_json_headers`].
    pub fn decode(self, bytes: &[u8]) -> Result<Headers, CodecError> {
        match self {
            HeaderFormat::Binary => decode_headers(bytes),
            HeaderFormat::Json => decode_json_headers(bytes),
        }
    }
}

/// Encodes headers in the binary layout.
///
/// # Errors
///
/// Fails when there are more than 65535 headers or a key or value is longer
/// than 65535 bytes.
///
/// # Examples
///
/// ```rust
/// use tchannel_transport::rpc::{HeaderCase, Headers};
/// use tchannel_transport::serialization::encode_headers;
///
/// let bytes = encode_headers(&Headers::new(), HeaderCase::Canonical).unwrap();
/// assert_eq!(&bytes[..], &[0x00, 0x00]);
/// ```
pub fn encode_headers(headers: &Headers, case: HeaderCase) -> Result<Bytes, CodecError> {
    let size = 2 + headers
        .iter()
        .map(|(key, value)| 4 + key.len() + value.len())
        .sum::<usize>();
    let mut buf = BytesMut::with_capacity(size);
    put_count16(&mut buf, headers.len(), "header count")?;
    for (key, value) in headers.iter_cased(case) {
        put_str16(&mut buf, key, "header key")?;
        put_str16(&mut buf, value, "header value")?;
    }
    Ok(buf.freeze())
}

/// Decodes headers from the binary layout.
///
/// # Errors
///
/// Fails on truncated input, non UTF-8 strings, repeated keys, or trailing
/// bytes.
pub fn decode_headers(bytes: &[u8]) -> Result<Headers, CodecError> {
    if bytes.is_empty() {
        return Ok(Headers::new());
    }
    let mut buf = Bytes::copy_from_slice(bytes);
    let count = get_u16(&mut buf, "header count")? as usize;
    let mut headers = Headers::with_capacity(count);
    for _ in 0..count {
        let key = get_str16(&mut buf, "header key")?;
        let value = get_str16(&mut buf, "header value")?;
        insert_unique(&mut headers, key, value)?;
    }
    if !buf.is_empty() {
        return Err(CodecError::TrailingBytes {
            context: "header block",
            count: buf.len(),
        });
    }
    Ok(headers)
}

/// Encodes headers as a JSON object. The empty set is `{}`.
///
/// # Errors
///
/// Fails only if JSON serialization fails.
pub fn encode_json_headers(headers: &Headers, case: HeaderCase) -> Result<Bytes, CodecError> {
    let map: BTreeMap<&str, &str> = headers.iter_cased(case).collect();
    Ok(Bytes::from(serde_json::to_vec(&map)?))
}

/// Decodes headers from a JSON object. Empty input and `null` decode to an
/// empty set.
///
/// # Errors
///
/// Fails on anything other than an object of strings, or on keys that
/// differ only in case.
pub fn decode_json_headers(bytes: &[u8]) -> Result<Headers, CodecError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Headers::new());
    }
    let map: Option<BTreeMap<String, String>> = serde_json::from_slice(bytes)?;
    let mut headers = Headers::new();
    for (key, value) in map.unwrap_or_default() {
        insert_unique(&mut headers, key, value)?;
    }
    Ok(headers)
}

fn insert_unique(headers: &mut Headers, key: String, value: String) -> Result<(), CodecError> {
    if headers.contains_key(&key) {
        return Err(CodecError::DuplicateHeader { key });
    }
    headers.set(key, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_binary_headers() {
        let bytes = encode_headers(&Headers::new(), HeaderCase::Canonical).unwrap();
        assert_eq!(&bytes[..], &[0x00, 0x00]);
        assert!(decode_headers(&[0x00, 0x00]).unwrap().is_empty());
        assert!(decode_headers(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_binary_layout() {
        let headers = Headers::new().with("ab", "c");
        let bytes = encode_headers(&headers, HeaderCase::Canonical).unwrap();
        assert_eq!(
            &bytes[..],
            &[0x00, 0x01, 0x00, 0x02, b'a', b'b', 0x00, 0x01, b'c']
        );
    }

    #[test]
    fn test_binary_bytes_survive_decode_encode() {
        let headers = Headers::new()
            .with("caller-zone", "us-east")
            .with("tenant", "")
            .with("trace", "0a1b2c");
        let bytes = encode_headers(&headers, HeaderCase::Canonical).unwrap();
        let decoded = decode_headers(&bytes).unwrap();
        assert_eq!(decoded, headers);
        assert_eq!(encode_headers(&decoded, HeaderCase::Canonical).unwrap(), bytes);
    }

    #[test]
    fn test_header_case_on_wire() {
        let headers = Headers::new().with("X-Zone", "a");
        let canonical = encode_headers(&headers, HeaderCase::Canonical).unwrap();
        let original = encode_headers(&headers, HeaderCase::Original).unwrap();
        assert_eq!(&canonical[4..10], b"x-zone");
        assert_eq!(&original[4..10], b"X-Zone");
    }

    #[test]
    fn test_truncated_binary_headers() {
        assert!(decode_headers(&[0x00, 0x01, 0x00, 0x05, b'a']).is_err());
        assert!(decode_headers(&[0x00]).is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        assert!(decode_headers(&[0x00, 0x00, 0xff]).is_err());
    }

    #[test]
    fn test_repeated_keys_rejected() {
        let bytes = [
            0x00, 0x02, 0x00, 0x01, b'K', 0x00, 0x01, b'1', 0x00, 0x01, b'k', 0x00, 0x01, b'2',
        ];
        let err = decode_headers(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::DuplicateHeader { ref key } if key == "k"));

        let err = decode_json_headers(br#"{"Tenant":"a","tenant":"b"}"#).unwrap_err();
        assert!(matches!(err, CodecError::DuplicateHeader { .. }));
    }

    #[test]
    fn test_empty_json_headers() {
        let bytes = encode_json_headers(&Headers::new(), HeaderCase::Canonical).unwrap();
        assert_eq!(&bytes[..], b"{}");
        assert!(decode_json_headers(b"{}").unwrap().is_empty());
        assert!(decode_json_headers(b"null").unwrap().is_empty());
        assert!(decode_json_headers(b"").unwrap().is_empty());
    }

    #[test]
    fn test_json_headers() {
        let headers = Headers::new().with("Key", "value");
        let bytes = encode_json_headers(&headers, HeaderCase::Canonical).unwrap();
        assert_eq!(&bytes[..], br#"{"key":"value"}"#);
        assert_eq!(decode_json_headers(&bytes).unwrap(), headers);
        assert!(decode_json_headers(b"[1,2]").is_err());
    }

    #[test]
    fn test_format_selection() {
        assert_eq!(HeaderFormat::for_format("json"), HeaderFormat::Json);
        assert_eq!(HeaderFormat::for_format("raw"), HeaderFormat::Binary);
        assert_eq!(HeaderFormat::for_format("thrift"), HeaderFormat::Binary);
    }
}
