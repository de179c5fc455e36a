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

//! Peers and peer-selection policies.
//!
//! A transport owns one [`Peer`] per remote address and keeps it connected
//! for as long as some [`Subscriber`] retains it through [`PeerTransport`].
//! Peer-selection policies implement [`Chooser`]: they retain their peers on
//! start, pick one per call, and release them on stop.
//!
//! Two policies ship with the crate:
//!
//! - [`Single`]: always the same peer
//! - [`PeerList`]: a changing set of peers, chosen round-robin or by fewest
//!   pending calls among those currently available

mod list;
mod single;
mod status;
mod traits;

pub use list::{PeerList, Selection};
pub use single::Single;
pub use status::{ConnectionStatus, PeerId, PeerStatus};
pub use traits::{Chooser, FinishFn, Peer, PeerTransport, Subscriber};

use crate::error::RpcError;
use crate::rpc::Request;

pub(crate) fn not_running(request: &Request) -> RpcError {
    RpcError::failed_precondition(format!(
        "peer chooser for service {:?} is not running",
        request.service
    ))
}

pub(crate) fn waiting_deadline_exceeded(request: &Request) -> RpcError {
    RpcError::deadline_exceeded(format!(
        "deadline exceeded while waiting for peer to call procedure {:?} of service {:?}",
        request.procedure, request.service
    ))
}
