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

//! Exponential backoff.

use super::BackoffStrategy;
use std::time::Duration;

/// Exponential backoff with an upper bound and optional full jitter.
///
/// The un-jittered delay for attempt `n` is
/// `initial_delay * multiplier^n`, capped at `max_delay`. With jitter the
/// actual delay is drawn uniformly from `[0, capped]`.
///
/// # Examples
///
/// ```
/// use tchannel_transport::transport::{BackoffStrategy, ExponentialBackoff};
/// use std::time::Duration;
///
/// let strategy = ExponentialBackoff::builder()
///     .initial_delay(Duration::from_millis(100))
///     .max_delay(Duration::from_secs(1))
///     .jitter(false)
///     .build();
///
/// assert_eq!(strategy.duration(0), Duration::from_millis(100));
/// assert_eq!(strategy.duration(2), Duration::from_millis(400));
/// assert_eq!(strategy.duration(10), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay before the first retry
    initial_delay: Duration,
    /// Upper bound on any delay
    max_delay: Duration,
    /// Growth factor per attempt
    multiplier: f64,
    /// Whether to randomize delays
    jitter: bool,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        ExponentialBackoffBuilder::default().build()
    }
}

impl ExponentialBackoff {
    /// Create a new builder for configuring exponential backoff.
    pub fn builder() -> ExponentialBackoffBuilder {
        ExponentialBackoffBuilder::default()
    }

    fn capped_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let max_ms = self.max_delay.as_millis() as f64;
        if !delay_ms.is_finite() || delay_ms >= max_ms {
            self.max_delay
        } else {
            Duration::from_millis(delay_ms as u64)
        }
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn duration(&self, attempt: u32) -> Duration {
        let capped = self.capped_delay(attempt);
        if self.jitter {
            let jitter_ms = (rand::random::<f64>() * capped.as_millis() as f64) as u64;
            Duration::from_millis(jitter_ms)
        } else {
            capped
        }
    }

    fn name(&self) -> &str {
        "exponential"
    }
}

/// Builder for [`ExponentialBackoff`].
#[derive(Debug, Clone)]
pub struct ExponentialBackoffBuilder {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
}

impl Default for ExponentialBackoffBuilder {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl ExponentialBackoffBuilder {
    /// Set the initial delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the multiplier for exponential growth.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Enable or disable jitter.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Build the exponential backoff strategy.
    pub fn build(self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_delay: self.initial_delay,
            max_delay: self.max_delay.max(self.initial_delay),
            multiplier: self.multiplier.max(1.0),
            jitter: self.jitter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let strategy = ExponentialBackoff::default();
        assert_eq!(strategy.initial_delay, Duration::from_millis(10));
        assert_eq!(strategy.max_delay, Duration::from_secs(1));
        assert_eq!(strategy.multiplier, 2.0);
        assert!(strategy.jitter);
    }

    #[test]
    fn test_growth_is_capped() {
        let strategy = ExponentialBackoff::builder()
            .initial_delay(Duration::from_millis(10))
            .max_delay(Duration::from_millis(100))
            .jitter(false)
            .build();

        assert_eq!(strategy.duration(0), Duration::from_millis(10));
        assert_eq!(strategy.duration(1), Duration::from_millis(20));
        assert_eq!(strategy.duration(3), Duration::from_millis(80));
        assert_eq!(strategy.duration(4), Duration::from_millis(100));
        assert_eq!(strategy.duration(u32::MAX), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_within_bound() {
        let strategy = ExponentialBackoff::builder()
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(400))
            .build();
        for attempt in 0..20 {
            assert!(strategy.duration(attempt) <= Duration::from_millis(400));
        }
    }

    #[test]
    fn test_builder_sanitizes() {
        let strategy = ExponentialBackoff::builder()
            .initial_delay(Duration::from_secs(2))
            .max_delay(Duration::from_secs(1))
            .multiplier(0.5)
            .jitter(false)
            .build();
        assert_eq!(strategy.max_delay, Duration::from_secs(2));
        assert_eq!(strategy.duration(3), Duration::from_secs(2));
    }
}
