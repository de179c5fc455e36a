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

//! Frame envelope for the call protocol.
//!
//! # Protocol
//!
//! ```text
//! +------------------+---------------+--------------+-------------------+
//! | Size (4 bytes)   | Type (1 byte) | Id (4 bytes) | Payload (N bytes) |
//! +------------------+---------------+--------------+-------------------+
//! ```
//!
//! - **Size**: u32 big-endian, length of type + id + payload
//! - **Type**: one of [`MessageType`]
//! - **Id**: u32 big-endian message id
//!
//! # Examples
//!
//! ```rust
//! use bytes::Bytes;
//! use tchannel_transport::serialization::{Frame, MessageType, read_frame, write_frame};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut buffer = Vec::new();
//! write_frame(&mut buffer, &Frame::new(MessageType::PingRequest, 7, Bytes::new())).await?;
//!
//! let mut reader = &buffer[..];
//! let frame = read_frame(&mut reader).await?.expect("one frame");
//! assert_eq!(frame.id, 7);
//! # Ok(())
//! # }
//! ```

use super::CodecError;
use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame size (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Bytes of type and id that follow the size prefix.
const ENVELOPE_SIZE: usize = 5;

/// Frame type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Connection handshake request.
    InitRequest,
    /// Connection handshake response.
    InitResponse,
    /// Call request.
    CallRequest,
    /// Call response.
    CallResponse,
    /// Liveness probe.
    PingRequest,
    /// Answer to a liveness probe.
    PingResponse,
    /// Protocol-level system error.
    Error,
}

impl MessageType {
    /// The type byte.
    pub fn as_u8(self) -> u8 {
        match self {
            MessageType::InitRequest => 0x01,
            MessageType::InitResponse => 0x02,
            MessageType::CallRequest => 0x03,
            MessageType::CallResponse => 0x04,
            MessageType::PingRequest => 0xd0,
            MessageType::PingResponse => 0xd1,
            MessageType::Error => 0xff,
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, CodecError> {
        Ok(match value {
            0x01 => MessageType::InitRequest,
            0x02 => MessageType::InitResponse,
            0x03 => MessageType::CallRequest,
            0x04 => MessageType::CallResponse,
            0xd0 => MessageType::PingRequest,
            0xd1 => MessageType::PingResponse,
            0xff => MessageType::Error,
            other => return Err(CodecError::UnknownMessageType(other)),
        })
    }
}

/// One message on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// What the payload contains.
    pub message_type: MessageType,
    /// Message id used to match responses to requests.
    pub id: u32,
    /// Encoded message body.
    pub payload: Bytes,
}

impl Frame {
    /// Creates a frame.
    pub fn new(message_type: MessageType, id: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            message_type,
            id,
            payload: payload.into(),
        }
    }
}

/// Writes one frame and flushes the writer.
///
/// # Errors
///
/// Fails if the frame is larger than [`MAX_FRAME_SIZE`] or the write fails.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let size = ENVELOPE_SIZE + frame.payload.len();
    if size > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut header = BytesMut::with_capacity(4 + ENVELOPE_SIZE);
    header.put_u32(size as u32);
    header.put_u8(frame.message_type.as_u8());
    header.put_u32(frame.id);

    writer.write_all(&header).await?;
    writer.write_all(&frame.payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame.
///
/// Returns `Ok(None)` when the stream ends cleanly before a new frame starts.
///
/// # Errors
///
/// Fails on truncated or oversized frames, unknown frame types, and I/O errors.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut size_buf = [0u8; 4];
    match reader.read_exact(&mut size_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let size = u32::from_be_bytes(size_buf) as usize;
    if size < ENVELOPE_SIZE {
        return Err(CodecError::Truncated {
            context: "frame envelope",
        });
    }
    if size > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut body = vec![0u8; size];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::Truncated {
                context: "frame payload",
            }
        } else {
            e.into()
        }
    })?;

    let message_type = MessageType::try_from(body[0])?;
    let id = u32::from_be_bytes([body[1], body[2], body[3], body[4]]);
    let payload = Bytes::from(body).slice(ENVELOPE_SIZE..);

    Ok(Some(Frame {
        message_type,
        id,
        payload,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_layout() {
        let mut buffer = Vec::new();
        let frame = Frame::new(MessageType::CallRequest, 0x0102_0304, &b"hi"[..]);
        write_frame(&mut buffer, &frame).await.unwrap();
        assert_eq!(
            buffer,
            vec![0, 0, 0, 7, 0x03, 0x01, 0x02, 0x03, 0x04, b'h', b'i']
        );
    }

    #[tokio::test]
    async fn test_read_multiple_frames() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &Frame::new(MessageType::PingRequest, 1, Bytes::new()))
            .await
            .unwrap();
        write_frame(&mut buffer, &Frame::new(MessageType::Error, 2, &b"x"[..]))
            .await
            .unwrap();

        let mut reader = &buffer[..];
        let first = read_frame(&mut reader).await.unwrap().unwrap();
        let second = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(first.message_type, MessageType::PingRequest);
        assert_eq!(second.id, 2);
        assert_eq!(second.payload, Bytes::from_static(b"x"));
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_payload() {
        let buffer = vec![0, 0, 0, 10, 0x03, 0, 0, 0, 1];
        let mut reader = &buffer[..];
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(CodecError::Truncated { .. })
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let buffer = (MAX_FRAME_SIZE as u32 + 1).to_be_bytes().to_vec();
        let mut reader = &buffer[..];
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(CodecError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_type() {
        let buffer = vec![0, 0, 0, 5, 0x42, 0, 0, 0, 1];
        let mut reader = &buffer[..];
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(CodecError::UnknownMessageType(0x42))
        ));
    }
}
