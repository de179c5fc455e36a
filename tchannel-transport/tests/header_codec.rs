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

//! Header codec behavior through the public API.

use tchannel_transport::rpc::{HeaderCase, Headers};
use tchannel_transport::serialization::{
    HeaderFormat, decode_headers, decode_json_headers, encode_headers, encode_json_headers,
};

#[test]
fn test_empty_header_set() {
    assert_eq!(
        &encode_headers(&Headers::new(), HeaderCase::Canonical).unwrap()[..],
        &[0x00, 0x00]
    );
    assert!(decode_headers(&[0x00, 0x00]).unwrap().is_empty());
    assert_eq!(
        &encode_json_headers(&Headers::new(), HeaderCase::Canonical).unwrap()[..],
        b"{}"
    );
}

#[test]
fn test_representative_sets_round_trip() {
    let sets = [
        Headers::new().with("a", "1"),
        Headers::new()
            .with("x-request-id", "5f0c")
            .with("x-empty", "")
            .with("x-unicode", "žluťoučký"),
        (0..300).map(|i| (format!("k{i}"), "v".repeat(i))).collect(),
    ];
    for headers in sets {
        let bytes = encode_headers(&headers, HeaderCase::Canonical).unwrap();
        let decoded = decode_headers(&bytes).unwrap();
        assert_eq!(decoded, headers);
        assert_eq!(encode_headers(&decoded, HeaderCase::Canonical).unwrap(), bytes);

        let json = encode_json_headers(&headers, HeaderCase::Canonical).unwrap();
        assert_eq!(decode_json_headers(&json).unwrap(), headers);
    }
}

#[test]
fn test_truncated_input_is_rejected() {
    let bytes = encode_headers(&Headers::new().with("key", "value"), HeaderCase::Canonical).unwrap();
    for len in 1..bytes.len() {
        assert!(decode_headers(&bytes[..len]).is_err(), "prefix of {len} bytes");
    }
}

#[test]
fn test_format_selection() {
    assert_eq!(HeaderFormat::for_format("json"), HeaderFormat::Json);
    assert_eq!(HeaderFormat::for_format("raw"), HeaderFormat::Binary);
    assert_eq!(HeaderFormat::for_format("thrift"), HeaderFormat::Binary);

    let headers = Headers::new().with("Tenant", "blue");
    let bytes = HeaderFormat::Json
        .encode(&headers, HeaderCase::Original)
        .unwrap();
    assert_eq!(&bytes[..], br#"{"Tenant":"blue"}"#);
}
