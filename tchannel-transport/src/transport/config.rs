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

//! Transport configuration.
//!
//! [`TransportConfig`] holds everything that can come from a configuration
//! file: it derives `serde` traits and every duration is written in
//! milliseconds. Collaborators that only exist at runtime (a pre-bound
//! listener, a shared channel, custom dialers or backoff strategies) are
//! supplied through [`TransportBuilder`].

use super::strategy::{BackoffStrategy, ExponentialBackoff};
use super::{Transport, TransportError};
use crate::channel::{Channel, Dialer};
use crate::rpc::HeaderCase;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// How outbound requests carrying reserved header keys are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservedHeaderPolicy {
    /// Drop reserved application headers and count them.
    #[default]
    Lenient,
    /// Fail the call with an invalid-argument error.
    Enforce,
}

/// Backoff parameters for connection retries.
///
/// # Examples
///
/// ```rust
/// use tchannel_transport::transport::BackoffConfig;
///
/// let config: BackoffConfig = serde_json::from_str(
///     r#"{"initial_interval": 50, "max_interval": 2000, "jitter": false}"#,
/// ).unwrap();
/// assert_eq!(config.initial_interval.as_millis(), 50);
/// assert_eq!(config.multiplier, 2.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    #[serde(with = "duration_ms")]
    pub initial_interval: Duration,
    /// Upper bound on any delay.
    #[serde(with = "duration_ms")]
    pub max_interval: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Randomize delays to spread out reconnect storms.
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl BackoffConfig {
    /// Builds the strategy these parameters describe.
    pub fn build(&self) -> ExponentialBackoff {
        ExponentialBackoff::builder()
            .initial_delay(self.initial_interval)
            .max_delay(self.max_interval)
            .multiplier(self.multiplier)
            .jitter(self.jitter)
            .build()
    }
}

/// Settings for a [`Transport`].
///
/// # Examples
///
/// ```rust
/// use tchannel_transport::transport::{ReservedHeaderPolicy, TransportConfig};
/// use std::time::Duration;
///
/// let config = TransportConfig::new("keyvalue")
///     .with_listen_addr("127.0.0.1:0")
///     .with_connection_timeout(Duration::from_millis(250))
///     .with_reserved_headers(ReservedHeaderPolicy::Enforce);
/// assert_eq!(config.service_name.as_deref(), Some("keyvalue"));
///
/// let parsed: TransportConfig = serde_json::from_str(
///     r#"{"service_name": "keyvalue", "connection_timeout": 250, "header_case": "original"}"#,
/// ).unwrap();
/// assert_eq!(parsed.connection_timeout, Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Service this transport serves and calls as. Required unless a shared
    /// channel is supplied through the builder.
    pub service_name: Option<String>,
    /// Process name sent in the init handshake.
    pub process_name: Option<String>,
    /// Address to listen on. Without one the transport is client-only.
    pub listen_addr: Option<String>,
    /// Bound on each connect attempt made by a peer's maintainer, handshake
    /// included.
    #[serde(with = "duration_ms")]
    pub connection_timeout: Duration,
    /// Retry backoff.
    pub backoff: BackoffConfig,
    /// Spelling of header keys written to the wire.
    pub header_case: HeaderCase,
    /// Treatment of reserved keys in outbound application headers.
    pub reserved_headers: ReservedHeaderPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            service_name: None,
            process_name: None,
            listen_addr: None,
            connection_timeout: Duration::from_millis(500),
            backoff: BackoffConfig::default(),
            header_case: HeaderCase::default(),
            reserved_headers: ReservedHeaderPolicy::default(),
        }
    }
}

impl TransportConfig {
    /// Creates a configuration for `service_name` with defaults elsewhere.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: Some(service_name.into()),
            ..Self::default()
        }
    }

    /// Sets the process name.
    #[must_use]
    pub fn with_process_name(mut self, process_name: impl Into<String>) -> Self {
        self.process_name = Some(process_name.into());
        self
    }

    /// Sets the listen address.
    #[must_use]
    pub fn with_listen_addr(mut self, listen_addr: impl Into<String>) -> Self {
        self.listen_addr = Some(listen_addr.into());
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the backoff parameters.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the header key spelling.
    #[must_use]
    pub fn with_header_case(mut self, header_case: HeaderCase) -> Self {
        self.header_case = header_case;
        self
    }

    /// Sets the reserved header policy.
    #[must_use]
    pub fn with_reserved_headers(mut self, policy: ReservedHeaderPolicy) -> Self {
        self.reserved_headers = policy;
        self
    }
}

/// Assembles a [`Transport`] from a configuration plus runtime collaborators.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tchannel_transport::transport::{FixedDelay, TransportBuilder, TransportConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
/// let transport = TransportBuilder::new(TransportConfig::new("keyvalue"))
///     .listener(listener)
///     .backoff_strategy(Arc::new(FixedDelay::new(Duration::from_millis(50))))
///     .build()?;
/// transport.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct TransportBuilder {
    pub(crate) config: TransportConfig,
    pub(crate) listener: Option<TcpListener>,
    pub(crate) channel: Option<Channel>,
    pub(crate) dialer: Option<Arc<dyn Dialer>>,
    pub(crate) backoff: Option<Arc<dyn BackoffStrategy>>,
    pub(crate) outbound_dialers: Vec<(String, Arc<dyn Dialer>)>,
}

impl TransportBuilder {
    /// Starts from `config`.
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            listener: None,
            channel: None,
            dialer: None,
            backoff: None,
            outbound_dialers: Vec::new(),
        }
    }

    /// Serves on an already bound listener instead of `listen_addr`.
    #[must_use]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Uses an existing channel instead of creating one.
    ///
    /// The transport does not listen on a shared channel and does not close
    /// it on stop; its owner does.
    #[must_use]
    pub fn channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Dials peers with `dialer` instead of plain TCP.
    #[must_use]
    pub fn dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    /// Replaces the backoff strategy built from the configuration.
    #[must_use]
    pub fn backoff_strategy(mut self, backoff: Arc<dyn BackoffStrategy>) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Reaches `destination` through a dedicated outbound-only channel that
    /// dials with `dialer`. This is how TLS is plugged in per destination.
    #[must_use]
    pub fn outbound_dialer(
        mut self,
        destination: impl Into<String>,
        dialer: Arc<dyn Dialer>,
    ) -> Self {
        self.outbound_dialers.push((destination.into(), dialer));
        self
    }

    /// Builds the transport.
    ///
    /// # Errors
    ///
    /// [`TransportError::InvalidConfiguration`] if neither a service name
    /// nor a shared channel was given, or if a shared channel is combined
    /// with a listener.
    pub fn build(self) -> Result<Transport, TransportError> {
        Transport::from_builder(self)
    }
}

impl fmt::Debug for TransportBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportBuilder")
            .field("config", &self.config)
            .field("listener", &self.listener.is_some())
            .field("channel", &self.channel)
            .field("backoff", &self.backoff)
            .field(
                "outbound_dialers",
                &self.outbound_dialers.iter().map(|(d, _)| d).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
