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

//! A single multiplexed connection.
//!
//! Each connection owns two tasks: a writer that drains a bounded frame queue
//! into the stream, and a reader that decodes frames and routes them. Call
//! responses and error frames complete pending outbound calls; call requests
//! are handed to the channel's [`CallHandler`](super::CallHandler) on their
//! own task, bounded by the deadline the caller sent.

use super::ChannelError;
use super::channel::ChannelInner;
use super::correlation::MessageIdGenerator;
use super::dialer::BoxedStream;
use super::handler::InboundCall;
use super::pending::{PendingCalls, PendingGuard};
use crate::serialization::{
    CallRequest, CallResponse, ErrorMessage, Frame, MessageType, SystemErrorCode, read_frame,
    write_frame,
};
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;

#[cfg(feature = "observability")]
use tracing::{debug, info, warn};

/// Depth of the per-connection outgoing frame queue.
const OUTGOING_QUEUE_DEPTH: usize = 1024;

/// Which side opened a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Accepted by our listener.
    Inbound,
    /// Dialed by us.
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => f.write_str("inbound"),
            Direction::Outbound => f.write_str("outbound"),
        }
    }
}

/// A handshaken connection to one remote peer.
pub struct Connection {
    id: u64,
    direction: Direction,
    remote_host_port: String,
    remote_process_name: String,
    outgoing: mpsc::Sender<Frame>,
    pending: PendingCalls,
    ids: MessageIdGenerator,
    closed: CancellationToken,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("direction", &self.direction)
            .field("remote_host_port", &self.remote_host_port)
            .field("pending", &self.pending.len())
            .field("active", &self.is_active())
            .finish()
    }
}

impl Connection {
    /// Wraps a stream that has completed the init handshake and starts its
    /// reader and writer tasks on the channel's connection tracker.
    pub(crate) fn start(
        id: u64,
        direction: Direction,
        remote_host_port: String,
        remote_process_name: String,
        stream: BoxedStream,
        channel: &Arc<ChannelInner>,
    ) -> Arc<Self> {
        let (reader, writer) = tokio::io::split(stream);
        let (outgoing, outgoing_rx) = mpsc::channel(OUTGOING_QUEUE_DEPTH);
        let connection = Arc::new(Self {
            id,
            direction,
            remote_host_port,
            remote_process_name,
            outgoing,
            pending: PendingCalls::new(),
            ids: MessageIdGenerator::new(),
            closed: channel.shutdown_token().child_token(),
        });

        channel
            .connection_tasks()
            .spawn(Arc::clone(&connection).write_loop(writer, outgoing_rx));
        channel
            .connection_tasks()
            .spawn(Arc::clone(&connection).read_loop(reader, Arc::clone(channel)));

        connection
    }

    /// Connection id, unique within its channel.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Which side opened the connection.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Address the remote peer is known by.
    pub fn remote_host_port(&self) -> &str {
        &self.remote_host_port
    }

    /// Process name the remote peer sent during the handshake.
    pub fn remote_process_name(&self) -> &str {
        &self.remote_process_name
    }

    /// Returns `true` until the connection starts shutting down.
    pub fn is_active(&self) -> bool {
        !self.closed.is_cancelled()
    }

    /// Number of outbound calls awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    /// Closes the connection. Calls in flight fail with
    /// [`ChannelError::ConnectionLost`].
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Sends a call and waits for its response until `deadline`.
    ///
    /// The TTL written to the frame is the time remaining until `deadline`.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::System`] if the remote side answered with an error frame
    /// - [`ChannelError::Timeout`] if `deadline` passed first
    /// - [`ChannelError::ConnectionLost`] if the connection died
    pub async fn call(
        &self,
        mut request: CallRequest,
        deadline: Instant,
    ) -> Result<CallResponse, ChannelError> {
        if !self.is_active() {
            return Err(self.lost("connection closed"));
        }

        request.ttl = deadline.saturating_duration_since(Instant::now());
        let payload = request.encode()?;
        let id = self.ids.next();
        let rx = self.pending.register(id);
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        timeout_at(deadline, async {
            self.send(Frame::new(MessageType::CallRequest, id, payload))
                .await?;
            rx.await
                .unwrap_or_else(|_| Err(self.lost("connection closed")))
        })
        .await
        .unwrap_or(Err(ChannelError::Timeout {
            operation: "call response",
        }))
    }

    /// Queues a frame for the writer task.
    pub(crate) async fn send(&self, frame: Frame) -> Result<(), ChannelError> {
        self.outgoing
            .send(frame)
            .await
            .map_err(|_| self.lost("connection closed"))
    }

    fn lost(&self, reason: &str) -> ChannelError {
        ChannelError::connection_lost(&self.remote_host_port, reason)
    }

    async fn write_loop(
        self: Arc<Self>,
        mut writer: WriteHalf<BoxedStream>,
        mut outgoing_rx: mpsc::Receiver<Frame>,
    ) {
        loop {
            // Drain queued frames before honoring a close so replies to
            // finished inbound calls still go out.
            let frame = tokio::select! {
                biased;
                frame = outgoing_rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
                _ = self.closed.cancelled() => break,
            };

            if let Err(_e) = write_frame(&mut writer, &frame).await {
                #[cfg(feature = "observability")]
                warn!(
                    connection = self.id,
                    peer = %self.remote_host_port,
                    error = %_e,
                    "Failed to write frame"
                );
                break;
            }
        }

        self.closed.cancel();
        let _ = writer.shutdown().await;
    }

    async fn read_loop(
        self: Arc<Self>,
        mut reader: ReadHalf<BoxedStream>,
        channel: Arc<ChannelInner>,
    ) {
        #[cfg(feature = "observability")]
        info!(
            connection = self.id,
            direction = %self.direction,
            peer = %self.remote_host_port,
            "Connection active"
        );

        let reason = loop {
            let frame = tokio::select! {
                _ = self.closed.cancelled() => break "connection closed".to_string(),
                frame = read_frame(&mut reader) => frame,
            };

            match frame {
                Ok(Some(frame)) => {
                    if let Err(reason) = self.dispatch(frame, &channel).await {
                        break reason;
                    }
                }
                Ok(None) => break "connection closed by peer".to_string(),
                Err(e) => break e.to_string(),
            }
        };

        #[cfg(feature = "observability")]
        info!(
            connection = self.id,
            peer = %self.remote_host_port,
            reason = %reason,
            "Connection closed"
        );

        self.closed.cancel();
        self.pending.fail_all(|| self.lost(&reason));
        channel.remove_connection(&self);
    }

    /// Routes one frame. An `Err` carries the reason to tear the connection down.
    async fn dispatch(
        self: &Arc<Self>,
        frame: Frame,
        channel: &Arc<ChannelInner>,
    ) -> Result<(), String> {
        let id = frame.id;
        match frame.message_type {
            MessageType::CallResponse => {
                let result = CallResponse::decode(frame.payload).map_err(ChannelError::from);
                if !self.pending.complete(id, result) {
                    #[cfg(feature = "observability")]
                    debug!(connection = self.id, id, "Dropping response for unknown call");
                }
            }
            MessageType::Error => {
                let result = ErrorMessage::decode(frame.payload)
                    .map(|err| ChannelError::System {
                        code: err.code,
                        message: err.message,
                    })
                    .unwrap_or_else(ChannelError::from);
                self.pending.complete(id, Err(result));
            }
            MessageType::CallRequest => match CallRequest::decode(frame.payload) {
                Ok(request) => self.accept_call(id, request, channel).await,
                Err(e) => {
                    self.reply_error(id, SystemErrorCode::BadRequest, e.to_string())
                        .await;
                }
            },
            MessageType::PingRequest => {
                let _ = self
                    .send(Frame::new(MessageType::PingResponse, id, bytes::Bytes::new()))
                    .await;
            }
            MessageType::PingResponse => {}
            MessageType::InitRequest | MessageType::InitResponse => {
                let message = "init message after handshake".to_string();
                self.reply_error(id, SystemErrorCode::ProtocolError, message.clone())
                    .await;
                return Err(message);
            }
        }
        Ok(())
    }

    async fn accept_call(
        self: &Arc<Self>,
        id: u32,
        request: CallRequest,
        channel: &Arc<ChannelInner>,
    ) {
        if channel.is_closing() {
            self.reply_error(id, SystemErrorCode::Declined, "channel is closing")
                .await;
            return;
        }
        let Some(handler) = channel.handler() else {
            let message = format!("no handler for service {:?}", request.service);
            self.reply_error(id, SystemErrorCode::BadRequest, message)
                .await;
            return;
        };

        let deadline = Instant::now() + request.ttl;
        let connection = Arc::clone(self);
        channel.inbound_calls().spawn(async move {
            let service = request.service.clone();
            let procedure = request.procedure.clone();
            let call = InboundCall {
                service: request.service,
                procedure: request.procedure,
                headers: request.headers,
                arg2: request.arg2,
                arg3: request.arg3,
                deadline,
                remote_host_port: connection.remote_host_port.clone(),
            };

            let frame = match timeout_at(deadline, handler.handle(call)).await {
                Ok(Ok(response)) => match response.encode() {
                    Ok(payload) => Frame::new(MessageType::CallResponse, id, payload),
                    Err(e) => error_frame(id, SystemErrorCode::Unexpected, e.to_string()),
                },
                Ok(Err(err)) => Frame::new(MessageType::Error, id, err.encode()),
                Err(_) => error_frame(
                    id,
                    SystemErrorCode::Timeout,
                    format!("call to procedure {procedure:?} of service {service:?} timed out"),
                ),
            };
            let _ = connection.send(frame).await;
        });
    }

    async fn reply_error(&self, id: u32, code: SystemErrorCode, message: impl Into<String>) {
        let _ = self.send(error_frame(id, code, message)).await;
    }
}

fn error_frame(id: u32, code: SystemErrorCode, message: impl Into<String>) -> Frame {
    Frame::new(MessageType::Error, id, ErrorMessage::new(code, message).encode())
}
