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

//! Idempotent start/stop state machine.
//!
//! [`Lifecycle`] is shared by the transport, outbounds, inbounds, and peer
//! choosers. Start and stop each run at most once; every other caller,
//! concurrent or later, waits for that run and receives its result.

use super::TransportError;
use std::fmt;
use std::future::Future;
use tokio::sync::{OnceCell, watch};

/// States an object moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    /// Constructed, not started.
    Idle,
    /// Start is running.
    Starting,
    /// Started successfully.
    Running,
    /// Stop is running.
    Stopping,
    /// Stopped, or failed to start.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
        })
    }
}

/// Runs start and stop routines exactly once.
///
/// - A failed start leaves the object [`Stopped`](LifecycleState::Stopped)
///   and the error is returned to every start caller.
/// - Stop while starting waits for start to finish first.
/// - Stop before start moves straight to `Stopped` without running the stop
///   routine; a later start fails with [`TransportError::Stopped`].
///
/// # Example
///
/// ```rust
/// use tchannel_transport::transport::{Lifecycle, LifecycleState};
///
/// # async fn example() {
/// let lifecycle = Lifecycle::new();
/// lifecycle.start(|| async { Ok(()) }).await.unwrap();
/// assert_eq!(lifecycle.state(), LifecycleState::Running);
///
/// lifecycle.stop(|| async { Ok(()) }).await.unwrap();
/// assert_eq!(lifecycle.state(), LifecycleState::Stopped);
/// # }
/// ```
#[derive(Debug)]
pub struct Lifecycle {
    state: watch::Sender<LifecycleState>,
    started: OnceCell<Result<(), TransportError>>,
    stopped: OnceCell<Result<(), TransportError>>,
}

impl Lifecycle {
    /// Creates an idle lifecycle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(LifecycleState::Idle),
            started: OnceCell::new(),
            stopped: OnceCell::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Returns `true` while [`Running`](LifecycleState::Running).
    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Watches state changes.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Runs `start` once.
    ///
    /// # Errors
    ///
    /// Returns whatever the first run of `start` returned, or
    /// [`TransportError::Stopped`] if stop won the race.
    pub async fn start<F, Fut>(&self, start: F) -> Result<(), TransportError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), TransportError>>,
    {
        self.started
            .get_or_init(|| async {
                let claimed = self.state.send_if_modified(|state| {
                    if *state == LifecycleState::Idle {
                        *state = LifecycleState::Starting;
                        true
                    } else {
                        false
                    }
                });
                if !claimed {
                    return Err(TransportError::Stopped);
                }

                let result = start().await;
                self.state.send_replace(if result.is_ok() {
                    LifecycleState::Running
                } else {
                    LifecycleState::Stopped
                });
                result
            })
            .await
            .clone()
    }

    /// Runs `stop` once, if start succeeded.
    ///
    /// # Errors
    ///
    /// Returns whatever the first run of `stop` returned.
    pub async fn stop<F, Fut>(&self, stop: F) -> Result<(), TransportError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), TransportError>>,
    {
        self.stopped
            .get_or_init(|| async {
                let mut rx = self.state.subscribe();
                // The sender lives in `self`, so this cannot observe a close.
                let _ = rx
                    .wait_for(|state| *state != LifecycleState::Starting)
                    .await;

                let mut previous = LifecycleState::Idle;
                self.state.send_if_modified(|state| {
                    previous = *state;
                    match *state {
                        LifecycleState::Running => {
                            *state = LifecycleState::Stopping;
                            true
                        }
                        LifecycleState::Idle => {
                            *state = LifecycleState::Stopped;
                            true
                        }
                        _ => false,
                    }
                });

                if previous != LifecycleState::Running {
                    return Ok(());
                }
                let result = stop().await;
                self.state.send_replace(LifecycleState::Stopped);
                result
            })
            .await
            .clone()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
