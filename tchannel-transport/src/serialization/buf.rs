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

//! Bounds-checked primitives shared by the message and header codecs.

use super::CodecError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub(crate) fn get_u8(buf: &mut Bytes, context: &'static str) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::Truncated { context });
    }
    Ok(buf.get_u8())
}

pub(crate) fn get_u16(buf: &mut Bytes, context: &'static str) -> Result<u16, CodecError> {
    if buf.remaining() < 2 {
        return Err(CodecError::Truncated { context });
    }
    Ok(buf.get_u16())
}

pub(crate) fn get_u32(buf: &mut Bytes, context: &'static str) -> Result<u32, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::Truncated { context });
    }
    Ok(buf.get_u32())
}

pub(crate) fn get_bytes(
    buf: &mut Bytes,
    len: usize,
    context: &'static str,
) -> Result<Bytes, CodecError> {
    if buf.remaining() < len {
        return Err(CodecError::Truncated { context });
    }
    Ok(buf.split_to(len))
}

pub(crate) fn get_string(
    buf: &mut Bytes,
    len: usize,
    context: &'static str,
) -> Result<String, CodecError> {
    let raw = get_bytes(buf, len, context)?;
    String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8 { context })
}

/// Reads a `u8`-length-prefixed string.
pub(crate) fn get_str8(buf: &mut Bytes, context: &'static str) -> Result<String, CodecError> {
    let len = get_u8(buf, context)? as usize;
    get_string(buf, len, context)
}

/// Reads a `u16`-length-prefixed string.
pub(crate) fn get_str16(buf: &mut Bytes, context: &'static str) -> Result<String, CodecError> {
    let len = get_u16(buf, context)? as usize;
    get_string(buf, len, context)
}

/// Reads a `u32`-length-prefixed byte string.
pub(crate) fn get_bytes32(buf: &mut Bytes, context: &'static str) -> Result<Bytes, CodecError> {
    let len = get_u32(buf, context)? as usize;
    get_bytes(buf, len, context)
}

fn check_len(len: usize, max: usize, context: &'static str) -> Result<(), CodecError> {
    if len > max {
        return Err(CodecError::TooLong { context, len, max });
    }
    Ok(())
}

pub(crate) fn put_str8(buf: &mut BytesMut, value: &str, context: &'static str) -> Result<(), CodecError> {
    check_len(value.len(), u8::MAX as usize, context)?;
    buf.put_u8(value.len() as u8);
    buf.put_slice(value.as_bytes());
    Ok(())
}

pub(crate) fn put_str16(buf: &mut BytesMut, value: &str, context: &'static str) -> Result<(), CodecError> {
    check_len(value.len(), u16::MAX as usize, context)?;
    buf.put_u16(value.len() as u16);
    buf.put_slice(value.as_bytes());
    Ok(())
}

pub(crate) fn put_bytes32(buf: &mut BytesMut, value: &[u8], context: &'static str) -> Result<(), CodecError> {
    check_len(value.len(), u32::MAX as usize, context)?;
    buf.put_u32(value.len() as u32);
    buf.put_slice(value);
    Ok(())
}

pub(crate) fn put_count16(buf: &mut BytesMut, count: usize, context: &'static str) -> Result<(), CodecError> {
    check_len(count, u16::MAX as usize, context)?;
    buf.put_u16(count as u16);
    Ok(())
}
