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

//! Fixed delay backoff.

use super::BackoffStrategy;
use std::time::Duration;

/// Waits the same amount of time before every retry.
///
/// ```
/// use tchannel_transport::transport::{BackoffStrategy, FixedDelay};
/// use std::time::Duration;
///
/// let strategy = FixedDelay::new(Duration::from_millis(250));
/// assert_eq!(strategy.duration(0), strategy.duration(9));
/// ```
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl FixedDelay {
    /// Create a fixed delay strategy.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl BackoffStrategy for FixedDelay {
    fn duration(&self, _attempt: u32) -> Duration {
        self.delay
    }

    fn name(&self) -> &str {
        "fixed"
    }
}
