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

//! Destination side of a circuit.

use std::sync::Arc;

use tracing::{info, warn};

use super::proto::{CircuitRelay, Status};
use super::stream_handler::StreamHandler;
use super::validate::{validate_message, Phase};
use super::{RelayConfig, RelayError};
use crate::deadline::Deadline;
use crate::monitoring::metrics::Metrics;
use crate::multiaddr::Multiaddr;
use crate::peer::PeerId;
use crate::stream::{BoxedStream, Connection, ConnectionKind};

/// STOP handler.
pub struct Stop {
    config: RelayConfig,
    metrics: Arc<Metrics>,
}

/// `/p2p-circuit/ipfs/<src>`.
pub fn relayed_addr(src: &PeerId) -> Multiaddr {
    Multiaddr::circuit().with_peer_id(src)
}

impl Stop {
    /// Handler honouring `config.stop`.
    pub fn new(config: RelayConfig, metrics: Arc<Metrics>) -> Self {
        Self { config, metrics }
    }

    /// Serve one STOP request already read from `sh`. On success the bare
    /// stream comes back tagged with the relayed source.
    pub async fn handle(
        &self,
        msg: CircuitRelay,
        mut sh: StreamHandler<BoxedStream>,
        deadline: &Deadline,
    ) -> Result<Connection, RelayError> {
        self.metrics.relay_stop_total.inc();
        let verdict = validate_message(&msg, Phase::Stop, self.config.max_addr_len).and_then(
            |(src, dst)| {
                if self.config.stop {
                    Ok((src, dst))
                } else {
                    Err(Status::StopRelayRefused)
                }
            },
        );
        let deadline = self.config.handshake_deadline(deadline);
        match verdict {
            Ok((src, _dst)) => {
                deadline.run(sh.write(&CircuitRelay::status(Status::Success))).await??;
                info!(src = %src.id(), "relayed connection accepted");
                let conn = Connection::new(sh.into_inner(), ConnectionKind::Relayed)
                    .with_remote_addr(relayed_addr(src.id()))
                    .with_remote_peer(src.id().clone());
                Ok(conn)
            }
            Err(status) => {
                self.metrics.relay_stop_rejected_total.inc();
                warn!(code = %status, "stop rejected");
                deadline.run(sh.write(&CircuitRelay::status(status))).await??;
                Err(RelayError::Status(status))
            }
        }
    }
}
