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

//! Transport metrics.
//!
//! Counters are kept in atomics so they can be read back directly (tests do
//! this), and are mirrored into the `metrics` facade when the
//! `observability` feature is enabled.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for connection, peer, and call activity.
///
/// # Examples
///
/// ```rust
/// use tchannel_transport::observability::TransportMetrics;
///
/// let metrics = TransportMetrics::new();
/// metrics.record_connection_opened();
/// metrics.record_call_sent();
///
/// assert_eq!(metrics.active_connections(), 1);
/// assert_eq!(metrics.calls_sent(), 1);
/// ```
#[derive(Debug, Default)]
pub struct TransportMetrics {
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    connect_attempts: AtomicU64,
    connect_failures: AtomicU64,
    peers_retained: AtomicU64,
    peers_released: AtomicU64,
    calls_sent: AtomicU64,
    call_failures: AtomicU64,
    application_errors: AtomicU64,
    inbound_calls: AtomicU64,
    inbound_failures: AtomicU64,
    reserved_headers_stripped: AtomicU64,
}

macro_rules! bump {
    ($field:expr, $name:literal) => {{
        $field.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!($name).increment(1);
    }};
}

impl TransportMetrics {
    /// Creates a zeroed set of counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a connection becoming active, in either direction.
    pub fn record_connection_opened(&self) {
        bump!(self.connections_opened, "tchannel.transport.connections.opened");
        #[cfg(feature = "observability")]
        metrics::gauge!("tchannel.transport.connections.active").increment(1.0);
    }

    /// Records a connection going away.
    pub fn record_connection_closed(&self) {
        bump!(self.connections_closed, "tchannel.transport.connections.closed");
        #[cfg(feature = "observability")]
        metrics::gauge!("tchannel.transport.connections.active").decrement(1.0);
    }

    /// Records a maintainer dialing a peer.
    pub fn record_connect_attempt(&self) {
        bump!(self.connect_attempts, "tchannel.transport.connect.attempts");
    }

    /// Records a failed or timed out dial.
    pub fn record_connect_failure(&self) {
        bump!(self.connect_failures, "tchannel.transport.connect.failures");
    }

    /// Records a peer being added to the registry.
    pub fn record_peer_retained(&self) {
        bump!(self.peers_retained, "tchannel.transport.peers.retained");
        #[cfg(feature = "observability")]
        metrics::gauge!("tchannel.transport.peers.active").increment(1.0);
    }

    /// Records a peer being dropped from the registry.
    pub fn record_peer_released(&self) {
        bump!(self.peers_released, "tchannel.transport.peers.released");
        #[cfg(feature = "observability")]
        metrics::gauge!("tchannel.transport.peers.active").decrement(1.0);
    }

    /// Records an outbound call being sent.
    pub fn record_call_sent(&self) {
        bump!(self.calls_sent, "tchannel.transport.calls.sent");
    }

    /// Records an outbound call that ended in an error.
    pub fn record_call_failure(&self) {
        bump!(self.call_failures, "tchannel.transport.calls.failed");
    }

    /// Records a response flagged as an application error, in either direction.
    pub fn record_application_error(&self) {
        bump!(
            self.application_errors,
            "tchannel.transport.calls.application_errors"
        );
    }

    /// Records an inbound call being dispatched.
    pub fn record_inbound_call(&self) {
        bump!(self.inbound_calls, "tchannel.transport.inbound.calls");
    }

    /// Records an inbound call answered with an error frame.
    pub fn record_inbound_failure(&self) {
        bump!(self.inbound_failures, "tchannel.transport.inbound.failed");
    }

    /// Records reserved headers dropped from an outbound request.
    pub fn record_reserved_headers_stripped(&self, count: u64) {
        self.reserved_headers_stripped
            .fetch_add(count, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("tchannel.transport.headers.reserved_stripped").increment(count);
    }

    /// Connections opened and not yet closed.
    pub fn active_connections(&self) -> u64 {
        self.connections_opened
            .load(Ordering::Relaxed)
            .saturating_sub(self.connections_closed.load(Ordering::Relaxed))
    }

    /// Total dial attempts.
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    /// Total failed dials.
    pub fn connect_failures(&self) -> u64 {
        self.connect_failures.load(Ordering::Relaxed)
    }

    /// Peers retained and not yet released.
    pub fn active_peers(&self) -> u64 {
        self.peers_retained
            .load(Ordering::Relaxed)
            .saturating_sub(self.peers_released.load(Ordering::Relaxed))
    }

    /// Total outbound calls sent.
    pub fn calls_sent(&self) -> u64 {
        self.calls_sent.load(Ordering::Relaxed)
    }

    /// Total outbound calls that failed.
    pub fn call_failures(&self) -> u64 {
        self.call_failures.load(Ordering::Relaxed)
    }

    /// Total application error responses.
    pub fn application_errors(&self) -> u64 {
        self.application_errors.load(Ordering::Relaxed)
    }

    /// Total inbound calls dispatched.
    pub fn inbound_calls(&self) -> u64 {
        self.inbound_calls.load(Ordering::Relaxed)
    }

    /// Total inbound calls answered with an error frame.
    pub fn inbound_failures(&self) -> u64 {
        self.inbound_failures.load(Ordering::Relaxed)
    }

    /// Total reserved headers stripped from outbound requests.
    pub fn reserved_headers_stripped(&self) -> u64 {
        self.reserved_headers_stripped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_gauges() {
        let metrics = TransportMetrics::new();
        metrics.record_connection_opened();
        metrics.record_connection_opened();
        metrics.record_connection_closed();
        assert_eq!(metrics.active_connections(), 1);

        metrics.record_peer_retained();
        metrics.record_peer_released();
        assert_eq!(metrics.active_peers(), 0);
    }

    #[test]
    fn test_closed_never_underflows() {
        let metrics = TransportMetrics::new();
        metrics.record_connection_closed();
        assert_eq!(metrics.active_connections(), 0);
    }

    #[test]
    fn test_counters() {
        let metrics = TransportMetrics::new();
        metrics.record_connect_attempt();
        metrics.record_connect_attempt();
        metrics.record_connect_failure();
        metrics.record_reserved_headers_stripped(3);
        assert_eq!(metrics.connect_attempts(), 2);
        assert_eq!(metrics.connect_failures(), 1);
        assert_eq!(metrics.reserved_headers_stripped(), 3);
    }
}
