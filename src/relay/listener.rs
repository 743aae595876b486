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

//! Accept path: serves the relay protocol and surfaces relayed connections.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::connector::Connector;
use super::hop::Hop;
use super::proto::{CircuitRelay, MessageType, Status};
use super::stop::Stop;
use super::stream_handler::StreamHandler;
use super::switch::{RelayBook, Switch};
use super::{RelayConfig, RelayError};
use crate::deadline::Deadline;
use crate::monitoring::metrics::Metrics;
use crate::multiaddr::{protocol, Multiaddr};
use crate::negotiation::{NegotiationConfig, ProtocolHandler};
use crate::peer::{PeerId, PeerInfo};
use crate::stream::{BoxedStream, Connection};

/// Relay protocol handler for all three roles.
///
/// Register it on a [`Router`](crate::negotiation::Router) under
/// [`RELAY_PROTOCOL`](super::RELAY_PROTOCOL). Accepted relayed connections
/// arrive on the receiver returned by [`Listener::create`].
pub struct Listener {
    switch: Arc<dyn Switch>,
    config: RelayConfig,
    hop: Hop,
    stop: Stop,
    connector: Connector,
    incoming: mpsc::Sender<Connection>,
}

impl Listener {
    /// Build the handler and its connection feed.
    pub fn create(
        switch: Arc<dyn Switch>,
        relays: Arc<RelayBook>,
        config: RelayConfig,
        negotiation: NegotiationConfig,
        metrics: Arc<Metrics>,
    ) -> (Arc<Self>, mpsc::Receiver<Connection>) {
        let (tx, rx) = mpsc::channel(64);
        let listener = Self {
            hop: Hop::new(
                Arc::clone(&switch),
                config.clone(),
                negotiation.clone(),
                Arc::clone(&metrics),
            ),
            stop: Stop::new(config.clone(), Arc::clone(&metrics)),
            connector: Connector::new(
                Arc::clone(&switch),
                relays,
                config.clone(),
                negotiation,
                metrics,
            ),
            switch,
            config,
            incoming: tx,
        };
        (Arc::new(listener), rx)
    }

    /// Announce ourselves to every configured relay with CAN_HOP. Returns the
    /// relays that accepted; failures are logged and skipped.
    pub async fn listen(&self, deadline: &Deadline) -> Vec<PeerId> {
        let mut accepted = Vec::new();
        for addr in &self.config.relays {
            let Some(id) = addr.peer_id() else {
                warn!(%addr, "relay address without peer id skipped");
                continue;
            };
            let relay = PeerInfo::with_addrs(id.clone(), [addr.clone()]);
            match self.connector.can_hop(&relay, deadline).await {
                Ok(true) => {
                    info!(relay = %id, "registered with relay");
                    accepted.push(id);
                }
                Ok(false) => warn!(relay = %id, "relay refused to hop"),
                Err(e) => warn!(relay = %id, error = %e, "relay unreachable"),
            }
        }
        accepted
    }

    /// Circuit addresses we are reachable at.
    pub fn addresses(&self) -> Vec<Multiaddr> {
        circuit_addresses(&self.switch.local_peer())
    }

    /// Serve one relay stream.
    pub async fn serve(&self, stream: BoxedStream, deadline: &Deadline) -> Result<(), RelayError> {
        let mut sh = StreamHandler::new(stream, self.config.max_message_len);
        let read_deadline = self.config.handshake_deadline(deadline);
        let msg = match read_deadline.run(sh.read()).await? {
            Ok(msg) => msg,
            Err(RelayError::Decode(e)) => {
                debug!(error = %e, "undecodable relay message");
                return reply_error(sh, Status::MalformedMessage).await;
            }
            Err(e) => return Err(e),
        };
        match msg.message_type() {
            Some(MessageType::Hop) => {
                if !self.config.hop {
                    return reply_error(sh, Status::HopCantSpeakRelay).await;
                }
                self.hop.handle(msg, sh, deadline).await
            }
            Some(MessageType::Stop) => {
                let conn = self.stop.handle(msg, sh, deadline).await?;
                if self.incoming.send(conn).await.is_err() {
                    debug!("relayed connection dropped, no receiver");
                }
                Ok(())
            }
            Some(MessageType::CanHop) => {
                let code = if self.config.hop { Status::Success } else { Status::HopCantSpeakRelay };
                sh.write(&CircuitRelay::status(code)).await
            }
            Some(MessageType::Status) | None => reply_error(sh, Status::MalformedMessage).await,
        }
    }
}

async fn reply_error(mut sh: StreamHandler<BoxedStream>, code: Status) -> Result<(), RelayError> {
    sh.write(&CircuitRelay::status(code)).await?;
    Err(RelayError::Status(code))
}

#[async_trait]
impl ProtocolHandler for Listener {
    async fn handle(&self, protocol: String, stream: BoxedStream) {
        if let Err(e) = self.serve(stream, &Deadline::none()).await {
            debug!(%protocol, error = %e, "relay stream ended with error");
        }
    }
}

fn names_peer(addr: &Multiaddr, id: &PeerId) -> bool {
    addr.iter().any(|s| s.code() == protocol::IPFS && s.value() == id.as_bytes())
}

/// Circuit addresses derived from `local`'s addresses.
///
/// Explicit circuit addresses that do not already name us replace the
/// defaults. Plain addresses are prefixed with `/p2p-circuit`, and any
/// address whose destination part lacks a peer id gets `/ipfs/<self>`.
pub fn circuit_addresses(local: &PeerInfo) -> Vec<Multiaddr> {
    let id = local.id();
    let own = Multiaddr::circuit().with_peer_id(id);
    let explicit: Vec<&Multiaddr> = local
        .addrs()
        .iter()
        .filter(|a| a.is_circuit() && !names_peer(a, id))
        .collect();
    let sources: Vec<&Multiaddr> =
        if explicit.is_empty() { local.addrs().iter().collect() } else { explicit };

    let mut out: Vec<Multiaddr> = Vec::new();
    for addr in sources {
        let circuit = if *addr == own {
            own.clone()
        } else if !addr.is_circuit() {
            let full = if addr.peer_id().is_some() { addr.clone() } else { addr.with_peer_id(id) };
            Multiaddr::circuit().encapsulate(&full)
        } else {
            match addr.split_circuit() {
                Some((_, dst)) if dst.peer_id().is_none() => addr.with_peer_id(id),
                _ => addr.clone(),
            }
        };
        if !out.contains(&circuit) {
            out.push(circuit);
        }
    }
    out
}
