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

//! Message id generation for multiplexed calls.

use std::sync::atomic::{AtomicU32, Ordering};

/// Generates per-connection message ids.
///
/// Ids start at 1 and wrap around, skipping 0, which the init handshake uses.
/// A connection would need four billion calls in flight at once before an id
/// could collide with a live one.
///
/// # Example
///
/// ```rust
/// use tchannel_transport::channel::MessageIdGenerator;
///
/// let generator = MessageIdGenerator::new();
/// assert_eq!(generator.next(), 1);
/// assert_eq!(generator.next(), 2);
/// ```
#[derive(Debug)]
pub struct MessageIdGenerator {
    next_id: AtomicU32,
}

impl MessageIdGenerator {
    /// Creates a generator starting at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
        }
    }

    /// Returns the next id.
    pub fn next(&self) -> u32 {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }
}

impl Default for MessageIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_wraps_past_zero() {
        let generator = MessageIdGenerator {
            next_id: AtomicU32::new(u32::MAX),
        };
        assert_eq!(generator.next(), u32::MAX);
        assert_eq!(generator.next(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_ids_unique() {
        let generator = Arc::new(MessageIdGenerator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let generator = Arc::clone(&generator);
            handles.push(tokio::spawn(async move {
                (0..500).map(|_| generator.next()).collect::<Vec<_>>()
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
