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

//! Tracking of outbound calls awaiting a response.

use super::ChannelError;
use crate::serialization::CallResponse;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// What a pending call eventually receives.
pub type CallResult = Result<CallResponse, ChannelError>;

/// Outbound calls awaiting a response, keyed by message id.
///
/// The connection's reader task completes entries as response or error
/// frames arrive; when the connection dies every remaining entry is failed.
///
/// # Example
///
/// ```rust
/// use tchannel_transport::channel::{ChannelError, PendingCalls};
///
/// # async fn example() {
/// let pending = PendingCalls::new();
/// let rx = pending.register(42);
/// pending.fail_all(|| ChannelError::Closed);
/// assert!(matches!(rx.await, Ok(Err(ChannelError::Closed))));
/// # }
/// ```
#[derive(Debug, Default)]
pub struct PendingCalls {
    calls: Mutex<HashMap<u32, oneshot::Sender<CallResult>>>,
}

impl PendingCalls {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a call and returns the receiver its result will arrive on.
    pub fn register(&self, id: u32) -> oneshot::Receiver<CallResult> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().insert(id, tx);
        rx
    }

    /// Delivers the result for `id`.
    ///
    /// Returns `false` if no call with that id is pending (it already
    /// completed, or its caller gave up).
    pub fn complete(&self, id: u32, result: CallResult) -> bool {
        match self.calls.lock().remove(&id) {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    /// Forgets a call without delivering a result.
    pub fn cancel(&self, id: u32) -> bool {
        self.calls.lock().remove(&id).is_some()
    }

    /// Fails every pending call with an error built by `error`.
    pub fn fail_all(&self, error: impl Fn() -> ChannelError) {
        let calls: Vec<_> = self.calls.lock().drain().collect();
        for (_, tx) in calls {
            let _ = tx.send(Err(error()));
        }
    }

    /// Number of calls in flight.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns `true` if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}

/// Removes a pending entry when the caller stops waiting, for example when
/// its deadline fires first.
pub(crate) struct PendingGuard<'a> {
    pub(crate) pending: &'a PendingCalls,
    pub(crate) id: u32,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.cancel(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::{ResponseCode, TransportHeaders};
    use bytes::Bytes;

    fn response() -> CallResponse {
        CallResponse {
            code: ResponseCode::Ok,
            headers: TransportHeaders::default(),
            arg2: Bytes::new(),
            arg3: Bytes::from_static(b"ok"),
        }
    }

    #[tokio::test]
    async fn test_complete_delivers_once() {
        let pending = PendingCalls::new();
        let rx = pending.register(1);
        assert!(pending.complete(1, Ok(response())));
        assert!(!pending.complete(1, Ok(response())));
        assert_eq!(rx.await.unwrap().unwrap().arg3, Bytes::from_static(b"ok"));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_guard_cancels_on_drop() {
        let pending = PendingCalls::new();
        let _rx = pending.register(7);
        {
            let _guard = PendingGuard {
                pending: &pending,
                id: 7,
            };
            assert_eq!(pending.len(), 1);
        }
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_fail_all() {
        let pending = PendingCalls::new();
        let first = pending.register(1);
        let second = pending.register(2);
        pending.fail_all(|| ChannelError::Closed);
        assert!(matches!(first.await, Ok(Err(ChannelError::Closed))));
        assert!(matches!(second.await, Ok(Err(ChannelError::Closed))));
        assert!(pending.is_empty());
    }
}
