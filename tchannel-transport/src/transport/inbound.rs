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

//! Inbound unary calls.

use super::{Lifecycle, Transport, TransportError};
use crate::rpc::{Procedure, Router};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Serves calls arriving on a transport's channel through a [`Router`].
///
/// Starting the inbound starts the transport. Stopping it leaves the
/// transport running; the transport owns the channel and is stopped on its
/// own.
pub struct Inbound {
    transport: Transport,
    router: RwLock<Option<Arc<dyn Router>>>,
    lifecycle: Lifecycle,
}

impl Inbound {
    /// Creates an inbound on `transport`.
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            router: RwLock::new(None),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Sets the router calls are dispatched to.
    pub fn set_router(&self, router: Arc<dyn Router>) {
        *self.router.write() = Some(Arc::clone(&router));
        self.transport.set_router(router);
    }

    /// Procedures the router serves.
    pub fn procedures(&self) -> Vec<Procedure> {
        self.router
            .read()
            .as_ref()
            .map(|router| router.procedures())
            .unwrap_or_default()
    }

    /// The transport calls arrive on.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Starts serving.
    ///
    /// # Errors
    ///
    /// Fails without a router, or if the transport fails to start.
    pub async fn start(&self) -> Result<(), TransportError> {
        self.lifecycle
            .start(|| async {
                let router = self.router.read().clone();
                if router.is_none() {
                    return Err(TransportError::invalid_configuration(
                        "no router configured for inbound",
                    ));
                }
                self.transport.start().await
            })
            .await
    }

    /// Stops serving.
    ///
    /// # Errors
    ///
    /// Repeated calls return the result of the first.
    pub async fn stop(&self) -> Result<(), TransportError> {
        self.lifecycle.stop(|| async { Ok(()) }).await
    }

    /// Returns `true` while running.
    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

impl fmt::Debug for Inbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbound")
            .field("transport", &self.transport)
            .field("state", &self.lifecycle.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::MapRouter;
    use crate::transport::TransportConfig;

    #[tokio::test]
    async fn test_start_requires_router() {
        let inbound = Inbound::new(Transport::new(TransportConfig::new("kv")).unwrap());
        let err = inbound.start().await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidConfiguration { .. }));
        assert!(!inbound.transport().is_running());
    }

    #[tokio::test]
    async fn test_start_starts_transport() {
        let transport =
            Transport::new(TransportConfig::new("kv").with_listen_addr("127.0.0.1:0")).unwrap();
        let inbound = Inbound::new(transport.clone());
        inbound.set_router(Arc::new(MapRouter::new("kv")));
        inbound.start().await.unwrap();
        assert!(transport.is_running());
        assert!(transport.local_addr().is_some());
        assert!(inbound.procedures().is_empty());

        inbound.stop().await.unwrap();
        assert!(transport.is_running());
        transport.stop().await.unwrap();
    }
}
