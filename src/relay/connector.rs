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

//! Dialing through relays.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::proto::{CircuitRelay, MessageType, Status};
use super::stream_handler::StreamHandler;
use super::switch::{RelayBook, Switch};
use super::{open_relay_stream, RelayConfig, RelayError};
use crate::deadline::Deadline;
use crate::monitoring::metrics::Metrics;
use crate::multiaddr::Multiaddr;
use crate::negotiation::NegotiationConfig;
use crate::peer::PeerInfo;
use crate::stream::{BoxedStream, Connection, ConnectionKind};

/// Client-facing dial path.
pub struct Connector {
    switch: Arc<dyn Switch>,
    relays: Arc<RelayBook>,
    config: RelayConfig,
    negotiation: NegotiationConfig,
    metrics: Arc<Metrics>,
}

impl Connector {
    /// Connector dialing through `switch`, trying relays recorded in `relays`.
    pub fn new(
        switch: Arc<dyn Switch>,
        relays: Arc<RelayBook>,
        config: RelayConfig,
        negotiation: NegotiationConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { switch, relays, config, negotiation, metrics }
    }

    /// Relay candidates for `addr`, which must contain `p2p-circuit`.
    ///
    /// An explicit relay part pins that relay; otherwise every known relay is
    /// a candidate except the destination itself.
    pub fn candidates(&self, addr: &Multiaddr) -> Result<(Vec<PeerInfo>, PeerInfo), RelayError> {
        let (relay_part, dst_part) = addr
            .split_circuit()
            .ok_or_else(|| RelayError::InvalidCircuitAddress(addr.clone()))?;
        let dst_id = dst_part.peer_id().ok_or_else(|| RelayError::MissingPeerId(dst_part.clone()))?;
        let dst = PeerInfo::with_addrs(dst_id, [dst_part]);

        if !relay_part.is_empty() {
            let relay_id = relay_part
                .peer_id()
                .ok_or_else(|| RelayError::MissingPeerId(relay_part.clone()))?;
            return Ok((vec![PeerInfo::with_addrs(relay_id, [relay_part])], dst));
        }
        let relays = self
            .relays
            .snapshot()
            .into_iter()
            .filter(|r| r.id() != dst.id())
            .collect();
        Ok((relays, dst))
    }

    /// Dial the peer named by the circuit address `addr`.
    ///
    /// Relays are tried in order; a failed or timed out attempt moves on to
    /// the next candidate. Cancellation or expiry of `deadline` ends the
    /// whole call.
    pub async fn connect(&self, addr: &Multiaddr, deadline: &Deadline) -> Result<Connection, RelayError> {
        let (relays, dst) = self.candidates(addr)?;
        if relays.is_empty() {
            warn!(%addr, "no relay candidates");
            return Err(RelayError::NoRelayAvailable);
        }
        for relay in &relays {
            self.metrics.relay_dial_attempts_total.inc();
            match self.dial_via(relay, &dst, deadline).await {
                Ok(io) => {
                    info!(relay = %relay.id(), dst = %dst.id(), "relayed dial succeeded");
                    return Ok(Connection::new(io, ConnectionKind::Relayed)
                        .with_remote_addr(addr.clone())
                        .with_remote_peer(dst.id().clone()));
                }
                Err(e) if e.is_interrupt() && deadline.is_expired() => {
                    self.metrics.relay_dial_failures_total.inc();
                    return Err(e);
                }
                Err(e) => {
                    self.metrics.relay_dial_failures_total.inc();
                    warn!(relay = %relay.id(), error = %e, "relay attempt failed");
                }
            }
        }
        Err(RelayError::NoRelayAvailable)
    }

    /// Send HOP for `dst` to one relay.
    pub async fn dial_via(
        &self,
        relay: &PeerInfo,
        dst: &PeerInfo,
        deadline: &Deadline,
    ) -> Result<BoxedStream, RelayError> {
        let deadline = self.config.handshake_deadline(deadline);
        let io = open_relay_stream(&self.switch, relay, &self.negotiation, &deadline).await?;
        let mut sh = StreamHandler::new(io, self.config.max_message_len);
        let hop = CircuitRelay::hop(&self.switch.local_peer(), dst);
        let reply = deadline
            .run(async {
                sh.write(&hop).await?;
                sh.read().await
            })
            .await??;
        expect_success(&reply)?;
        Ok(sh.into_inner())
    }

    /// Ask `relay` whether it will hop for us; remembers it on SUCCESS.
    pub async fn can_hop(&self, relay: &PeerInfo, deadline: &Deadline) -> Result<bool, RelayError> {
        let deadline = self.config.handshake_deadline(deadline);
        let io = open_relay_stream(&self.switch, relay, &self.negotiation, &deadline).await?;
        let mut sh = StreamHandler::new(io, self.config.max_message_len);
        let reply = deadline
            .run(async {
                sh.write(&CircuitRelay::can_hop()).await?;
                sh.read().await
            })
            .await??;
        match expect_success(&reply) {
            Ok(()) => {
                debug!(relay = %relay.id(), "relay can hop");
                self.relays.insert(relay.clone());
                Ok(true)
            }
            Err(RelayError::Status(code)) => {
                debug!(relay = %relay.id(), %code, "relay cannot hop");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// Replies are judged by their code. A missing type is tolerated, any type
/// other than STATUS is not.
fn expect_success(reply: &CircuitRelay) -> Result<(), RelayError> {
    if reply.r#type.is_some() && reply.message_type() != Some(MessageType::Status) {
        return Err(RelayError::UnexpectedMessage(format!("{:?}", reply.r#type)));
    }
    match reply.status_code() {
        Some(Status::Success) => Ok(()),
        Some(code) => Err(RelayError::Status(code)),
        None => Err(RelayError::UnexpectedMessage("status without code".into())),
    }
}
