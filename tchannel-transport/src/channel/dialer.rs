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

//! Pluggable stream establishment.
//!
//! A [`Dialer`] turns a `host:port` string into a byte stream. The default
//! [`TcpDialer`] opens plain TCP connections; TLS or in-process streams can be
//! layered in by supplying another implementation.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

#[cfg(feature = "observability")]
use tracing::debug;

/// A bidirectional byte stream a connection can run over.
pub trait Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Stream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Type-erased stream.
pub type BoxedStream = Box<dyn Stream>;

/// Opens streams to remote peers.
///
/// # Example
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use tchannel_transport::channel::{BoxedStream, Dialer};
///
/// struct Loopback;
///
/// #[async_trait]
/// impl Dialer for Loopback {
///     async fn dial(&self, _host_port: &str) -> std::io::Result<BoxedStream> {
///         let (client, _server) = tokio::io::duplex(64 * 1024);
///         Ok(Box::new(client))
///     }
/// }
/// ```
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Opens a stream to `host_port`.
    async fn dial(&self, host_port: &str) -> io::Result<BoxedStream>;
}

/// Plain TCP dialer.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    nodelay: bool,
}

impl TcpDialer {
    /// Creates a dialer with `TCP_NODELAY` enabled.
    #[must_use]
    pub fn new() -> Self {
        Self { nodelay: true }
    }

    /// Sets whether `TCP_NODELAY` is enabled on dialed sockets.
    #[must_use]
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, host_port: &str) -> io::Result<BoxedStream> {
        let stream = TcpStream::connect(host_port).await?;
        stream.set_nodelay(self.nodelay)?;

        #[cfg(feature = "observability")]
        debug!(
            peer = host_port,
            local_addr = ?stream.local_addr().ok(),
            "TCP connection established"
        );

        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_dialer_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut stream = TcpDialer::new().dial(&addr.to_string()).await.unwrap();
        stream.write_all(b"ping").await.unwrap();
        assert_eq!(&server.await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn test_tcp_dialer_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert!(TcpDialer::new().dial(&addr.to_string()).await.is_err());
    }
}
