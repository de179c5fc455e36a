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

//! Backoff strategies for connection retries.
//!
//! A peer's connection maintainer sleeps for
//! [`BackoffStrategy::duration`] after each failed connect attempt. The
//! attempt counter starts at 0 and resets whenever the peer becomes
//! available.
//!
//! # Available Strategies
//!
//! - [`ExponentialBackoff`]: grows the delay geometrically, capped, with
//!   optional full jitter (default)
//! - [`FixedDelay`]: the same delay every time
//!
//! # Examples
//!
//! ```rust
//! use tchannel_transport::transport::ExponentialBackoff;
//! use std::time::Duration;
//!
//! let strategy = ExponentialBackoff::builder()
//!     .initial_delay(Duration::from_millis(10))
//!     .max_delay(Duration::from_secs(1))
//!     .multiplier(2.0)
//!     .jitter(true)
//!     .build();
//! ```

mod exponential;
mod fixed;

pub use exponential::{ExponentialBackoff, ExponentialBackoffBuilder};
pub use fixed::FixedDelay;

use std::fmt;
use std::time::Duration;

/// Decides how long to wait before a retry.
pub trait BackoffStrategy: Send + Sync + fmt::Debug {
    /// Delay before retry number `attempt`, counting from 0.
    fn duration(&self, attempt: u32) -> Duration;

    /// Short name for logs.
    fn name(&self) -> &str;
}
