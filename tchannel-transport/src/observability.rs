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

//! Metrics for the transport.
//!
//! Every [`Transport`](crate::transport::Transport) and
//! [`Channel`](crate::channel::Channel) reports into a [`TransportMetrics`]:
//! plain atomic counters that can always be read in-process. With the
//! `observability` feature enabled each update is also recorded through the
//! [`metrics`](https://docs.rs/metrics) facade under the `tchannel.transport.`
//! prefix, so any installed recorder (Prometheus, StatsD, ...) picks them up.
//!
//! Structured logs are emitted through [`tracing`](https://docs.rs/tracing)
//! under the same feature.
//!
//! ```rust
//! use tchannel_transport::observability::TransportMetrics;
//!
//! let metrics = TransportMetrics::new();
//! metrics.record_connect_attempt();
//! metrics.record_connect_failure();
//! assert_eq!(metrics.connect_attempts(), 1);
//! assert_eq!(metrics.connect_failures(), 1);
//! ```

mod metrics;

pub use self::metrics::TransportMetrics;
