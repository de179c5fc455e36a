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

use super::Headers;
use crate::error::{Code, RpcError};
use bytes::{Bytes, BytesMut};

/// Details a handler attached to an application error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationErrorMeta {
    /// Application-defined error name.
    pub name: Option<String>,
    /// Free-form error details.
    pub details: Option<String>,
    /// Status code the application associated with the failure.
    pub code: Option<Code>,
}

impl ApplicationErrorMeta {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.details.is_none() && self.code.is_none()
    }
}

/// The result of a successful unary call.
///
/// A call the callee marked as a business-logic failure is still a
/// `Response`: `application_error` is set and `application_error_meta` carries
/// whatever details the callee attached. Transport failures are never
/// represented here; they are returned as [`RpcError`].
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// Response headers with all reserved keys removed.
    pub headers: Headers,
    /// Response body.
    pub body: Bytes,
    /// Whether the callee flagged this response as an application error.
    pub application_error: bool,
    /// Application error details, when the callee sent any.
    pub application_error_meta: Option<ApplicationErrorMeta>,
}

/// Sink a handler writes its response into.
pub trait ResponseWriter: Send {
    /// Adds response headers.
    fn add_headers(&mut self, headers: Headers);

    /// Marks the response as an application error.
    fn set_application_error(&mut self);

    /// Attaches application error details. Implies [`set_application_error`](Self::set_application_error).
    fn set_application_error_meta(&mut self, meta: ApplicationErrorMeta);

    /// Appends bytes to the response body.
    ///
    /// # Errors
    ///
    /// Fails once the writer has been closed.
    fn write(&mut self, data: &[u8]) -> Result<(), RpcError>;

    /// Closes the writer. Further writes fail.
    fn close(&mut self);
}

/// In-memory [`ResponseWriter`] used by the inbound dispatcher.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    headers: Headers,
    body: BytesMut,
    application_error: bool,
    meta: ApplicationErrorMeta,
    closed: bool,
}

impl ResponseBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the handler marked the response as an application error.
    pub fn is_application_error(&self) -> bool {
        self.application_error
    }

    /// Headers written so far.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Consumes the buffer into a [`Response`].
    pub fn into_response(self) -> Response {
        let meta = (!self.meta.is_empty()).then_some(self.meta);
        Response {
            headers: self.headers,
            body: self.body.freeze(),
            application_error: self.application_error,
            application_error_meta: meta,
        }
    }
}

impl ResponseWriter for ResponseBuffer {
    fn add_headers(&mut self, headers: Headers) {
        for (key, value) in headers.original_iter() {
            self.headers.set(key, value);
        }
    }

    fn set_application_error(&mut self) {
        self.application_error = true;
    }

    fn set_application_error_meta(&mut self, meta: ApplicationErrorMeta) {
        self.application_error = true;
        self.meta = meta;
    }

    fn write(&mut self, data: &[u8]) -> Result<(), RpcError> {
        if self.closed {
            return Err(RpcError::internal("response writer is already closed"));
        }
        self.body.extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_collects_response() {
        let mut buffer = ResponseBuffer::new();
        buffer.add_headers(Headers::new().with("A", "1"));
        buffer.write(b"hello ").unwrap();
        buffer.write(b"world").unwrap();
        let response = buffer.into_response();
        assert_eq!(response.body, Bytes::from_static(b"hello world"));
        assert_eq!(response.headers.get("a"), Some("1"));
        assert!(!response.application_error);
        assert!(response.application_error_meta.is_none());
    }

    #[test]
    fn test_write_after_close_fails() {
        let mut buffer = ResponseBuffer::new();
        buffer.close();
        let err = buffer.write(b"late").unwrap_err();
        assert_eq!(err.code(), Code::Internal);
    }

    #[test]
    fn test_meta_implies_application_error() {
        let mut buffer = ResponseBuffer::new();
        buffer.set_application_error_meta(ApplicationErrorMeta {
            name: Some("Overdrawn".into()),
            ..Default::default()
        });
        assert!(buffer.is_application_error());
        let response = buffer.into_response();
        assert!(response.application_error);
        assert_eq!(
            response.application_error_meta.and_then(|meta| meta.name),
            Some("Overdrawn".to_string())
        );
    }
}
