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

//! Relay side of a circuit: `AwaitHop -> DialOrReuseDst -> AwaitStopReply ->
//! Splicing`, or a status reply on the first failure.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::proto::{CircuitRelay, Status};
use super::stream_handler::StreamHandler;
use super::switch::Switch;
use super::validate::{validate_message, Phase};
use super::{open_relay_stream, RelayConfig, RelayError};
use crate::deadline::Deadline;
use crate::monitoring::metrics::Metrics;
use crate::negotiation::NegotiationConfig;
use crate::peer::PeerId;
use crate::stream::BoxedStream;

/// What to do with a valid HOP.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HopDecision {
    /// Answer with this status and stop.
    Reject(Status),
    /// Open a stream over the live connection.
    UseExisting,
    /// Dial the destination first.
    DialFresh,
}

/// Decide how relay `local` reaches `dst` on behalf of `src`.
pub fn evaluate_hop(
    local: &PeerId,
    src: &PeerId,
    dst: &PeerId,
    connected: bool,
    config: &RelayConfig,
) -> HopDecision {
    if !config.hop {
        HopDecision::Reject(Status::HopCantSpeakRelay)
    } else if dst == src || dst == local {
        HopDecision::Reject(Status::HopCantRelayToSelf)
    } else if connected {
        HopDecision::UseExisting
    } else if config.active {
        HopDecision::DialFresh
    } else {
        HopDecision::Reject(Status::HopNoConnToDst)
    }
}

/// Status for a destination the relay could not negotiate with. A protocol
/// refusal is `HOP_CANT_SPEAK_RELAY`; anything else is `dial_failure`.
pub fn unreachable_status(err: &RelayError, dial_failure: Status) -> Status {
    match err {
        RelayError::Negotiation(e) if e.is_refusal() => Status::HopCantSpeakRelay,
        _ => dial_failure,
    }
}

/// HOP handler.
pub struct Hop {
    switch: Arc<dyn Switch>,
    config: RelayConfig,
    negotiation: NegotiationConfig,
    metrics: Arc<Metrics>,
}

impl Hop {
    /// Handler dialing through `switch`.
    pub fn new(
        switch: Arc<dyn Switch>,
        config: RelayConfig,
        negotiation: NegotiationConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { switch, config, negotiation, metrics }
    }

    /// Serve one HOP request already read from `src`. On success the circuit
    /// is spliced on a background task and this returns.
    pub async fn handle(
        &self,
        msg: CircuitRelay,
        mut src: StreamHandler<BoxedStream>,
        deadline: &Deadline,
    ) -> Result<(), RelayError> {
        self.metrics.relay_hop_total.inc();
        let deadline = self.config.handshake_deadline(deadline);
        match deadline.run(self.establish(&msg)).await {
            Ok(Ok(dst)) => {
                src.write(&CircuitRelay::status(Status::Success)).await?;
                self.splice(src.into_inner(), dst);
                Ok(())
            }
            Ok(Err(status)) => {
                self.metrics.relay_hop_rejected_total.inc();
                warn!(code = %status, "hop rejected");
                src.write(&CircuitRelay::status(status)).await?;
                Err(RelayError::Status(status))
            }
            Err(interrupted) => {
                self.metrics.relay_hop_rejected_total.inc();
                warn!(error = %interrupted, "hop handshake interrupted");
                let reply = CircuitRelay::status(Status::HopCantOpenDstStream);
                if let Err(e) = src.write(&reply).await {
                    debug!(error = %e, "hop status not delivered");
                }
                Err(interrupted.into())
            }
        }
    }

    async fn establish(&self, msg: &CircuitRelay) -> Result<BoxedStream, Status> {
        let (src, dst) = validate_message(msg, Phase::Hop, self.config.max_addr_len)?;
        let local = self.switch.local_peer();
        let connected = self.switch.is_connected(dst.id());
        let decision = evaluate_hop(local.id(), src.id(), dst.id(), connected, &self.config);
        let dial_failure = match decision {
            HopDecision::Reject(status) => return Err(status),
            HopDecision::UseExisting => Status::HopCantOpenDstStream,
            HopDecision::DialFresh => Status::HopCantDialDst,
        };
        debug!(src = %src.id(), dst = %dst.id(), ?decision, "hop accepted");

        let io = open_relay_stream(&self.switch, &dst, &self.negotiation, &Deadline::none())
            .await
            .map_err(|e| {
                let status = unreachable_status(&e, dial_failure);
                debug!(error = %e, code = %status, "cannot reach destination over relay");
                status
            })?;

        let mut dst_handler = StreamHandler::new(io, self.config.max_message_len);
        let stop = CircuitRelay::stop(msg.src_peer.clone(), msg.dst_peer.clone());
        let reply = async {
            dst_handler.write(&stop).await?;
            dst_handler.read().await
        }
        .await
        .map_err(|e| {
            debug!(error = %e, "stop exchange failed");
            Status::HopCantOpenDstStream
        })?;
        match reply.status_code() {
            Some(Status::Success) => Ok(dst_handler.into_inner()),
            Some(code) => Err(code),
            None => Err(Status::HopCantOpenDstStream),
        }
    }

    fn splice(&self, mut src: BoxedStream, mut dst: BoxedStream) {
        let metrics = Arc::clone(&self.metrics);
        metrics.relay_circuits_active.inc();
        info!("circuit spliced");
        tokio::spawn(async move {
            match tokio::io::copy_bidirectional(&mut src, &mut dst).await {
                Ok((up, down)) => {
                    metrics.relay_spliced_bytes_total.inc_by(up + down);
                    debug!(up, down, "circuit closed");
                }
                Err(e) => debug!(error = %e, "circuit aborted"),
            }
            metrics.relay_circuits_active.dec();
        });
    }
}
