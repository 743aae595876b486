// Copyright (c) 2026 Hopwire
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Circuit relay v0.1.0.
//!
//! Three roles share one negotiated protocol: the source sends HOP to a
//! relay, the relay sends STOP to the destination, and once both answer
//! SUCCESS the relay splices the two streams into a blind byte pipe.
//! [`Connector`] is the dial surface, [`Listener`] the accept surface.

pub mod connector;
pub mod hop;
pub mod listener;
pub mod proto;
pub mod stop;
pub mod stream_handler;
pub mod switch;
pub mod validate;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::deadline::{Deadline, Interrupted};
use crate::framing::FramingError;
use crate::multiaddr::Multiaddr;
use crate::negotiation::{Dialer, NegotiationConfig, NegotiationError};
use crate::peer::PeerInfo;
use crate::stream::BoxedStream;

pub use connector::Connector;
pub use hop::{evaluate_hop, unreachable_status, Hop, HopDecision};
pub use listener::{circuit_addresses, Listener};
pub use proto::{CircuitRelay, MessageType, Peer, Status};
pub use stop::Stop;
pub use stream_handler::StreamHandler;
pub use switch::{RelayBook, Switch, SwitchError};

/// Relay protocol id.
pub const RELAY_PROTOCOL: &str = "/libp2p/circuit/relay/0.1.0";

/// Relay errors.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The remote answered with a failure status.
    #[error("relay status {0}")]
    Status(Status),
    /// Undecodable relay message.
    #[error("decode: {0}")]
    Decode(#[from] prost::DecodeError),
    /// Relay message stream failed.
    #[error("framing: {0}")]
    Framing(#[from] FramingError),
    /// Could not agree on the relay protocol.
    #[error("negotiation: {0}")]
    Negotiation(#[from] NegotiationError),
    /// Switch could not provide a stream.
    #[error("switch: {0}")]
    Switch(#[from] SwitchError),
    /// A reply that is not a STATUS message.
    #[error("unexpected relay message: {0}")]
    UnexpectedMessage(String),
    /// Address has no `p2p-circuit` segment.
    #[error("not a circuit address: {0}")]
    InvalidCircuitAddress(Multiaddr),
    /// Address part lacks an `/ipfs/<id>` segment.
    #[error("missing peer id in {0}")]
    MissingPeerId(Multiaddr),
    /// Every candidate relay failed, or there were none.
    #[error("no relay available")]
    NoRelayAvailable,
    /// The caller's cancellation token fired.
    #[error("cancelled")]
    Cancelled,
    /// The caller's deadline passed.
    #[error("timed out")]
    TimedOut,
}

impl From<Interrupted> for RelayError {
    fn from(i: Interrupted) -> Self {
        match i {
            Interrupted::Cancelled => Self::Cancelled,
            Interrupted::TimedOut => Self::TimedOut,
        }
    }
}

impl RelayError {
    /// Cancellation and timeouts end the whole operation instead of one attempt.
    pub fn is_interrupt(&self) -> bool {
        matches!(
            self,
            RelayError::Cancelled
                | RelayError::TimedOut
                | RelayError::Negotiation(NegotiationError::Cancelled | NegotiationError::TimedOut)
        )
    }
}

/// Relay behaviour and limits.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelayConfig {
    /// Answer HOP and CAN_HOP.
    pub hop: bool,
    /// Dial destinations we hold no connection to.
    pub active: bool,
    /// Accept relayed connections.
    pub stop: bool,
    /// Deadline for one HOP/STOP/CAN_HOP exchange.
    pub handshake_timeout_ms: u64,
    /// Largest relay message.
    pub max_message_len: usize,
    /// Largest binary multiaddr inside a message.
    pub max_addr_len: usize,
    /// Relays to announce ourselves to (`.../ipfs/<relay>`).
    pub relays: Vec<Multiaddr>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            hop: false,
            active: false,
            stop: true,
            handshake_timeout_ms: 10_000,
            max_message_len: 4096,
            max_addr_len: 1024,
            relays: Vec::new(),
        }
    }
}

impl RelayConfig {
    /// Handshake deadline as a duration.
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// `deadline` tightened by the handshake timeout.
    pub(crate) fn handshake_deadline(&self, deadline: &Deadline) -> Deadline {
        deadline
            .clone()
            .min(Some(tokio::time::Instant::now() + self.handshake_timeout()))
    }
}

/// Dial `peer` and agree on [`RELAY_PROTOCOL`].
pub(crate) async fn open_relay_stream(
    switch: &Arc<dyn Switch>,
    peer: &PeerInfo,
    negotiation: &NegotiationConfig,
    deadline: &Deadline,
) -> Result<BoxedStream, RelayError> {
    let io = deadline.run(switch.dial(peer)).await??;
    let mut dialer = Dialer::new(io, negotiation).with_deadline(deadline.clone());
    dialer.select(RELAY_PROTOCOL).await?;
    Ok(dialer.into_inner())
}
