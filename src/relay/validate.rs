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

//! Peer and address checks for HOP and STOP. Failures map to the status the
//! handler answers with; nothing here waits on I/O.

use super::proto::{CircuitRelay, Peer, Status};
use crate::multiaddr::Multiaddr;
use crate::peer::{PeerId, PeerInfo};

/// Which request is being validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// HOP on the relay.
    Hop,
    /// STOP on the destination.
    Stop,
}

struct Codes {
    too_long: Status,
    invalid: Status,
}

impl Phase {
    fn src(self) -> Codes {
        match self {
            Phase::Hop => Codes {
                too_long: Status::HopSrcAddrTooLong,
                invalid: Status::HopSrcMultiaddrInvalid,
            },
            Phase::Stop => Codes {
                too_long: Status::StopSrcAddrTooLong,
                invalid: Status::StopSrcMultiaddrInvalid,
            },
        }
    }

    fn dst(self) -> Codes {
        match self {
            Phase::Hop => Codes {
                too_long: Status::HopDstAddrTooLong,
                invalid: Status::HopDstMultiaddrInvalid,
            },
            Phase::Stop => Codes {
                too_long: Status::StopDstAddrTooLong,
                invalid: Status::StopDstMultiaddrInvalid,
            },
        }
    }
}

fn validate_peer(
    peer: Option<&Peer>,
    codes: Codes,
    require_addrs: bool,
    max_addr_len: usize,
) -> Result<PeerInfo, Status> {
    let peer = peer.ok_or(codes.invalid)?;
    let id = PeerId::from_bytes(&peer.id).map_err(|_| codes.invalid)?;
    if require_addrs && peer.addrs.is_empty() {
        return Err(codes.invalid);
    }
    let mut addrs = Vec::with_capacity(peer.addrs.len());
    for raw in &peer.addrs {
        if raw.len() > max_addr_len {
            return Err(codes.too_long);
        }
        addrs.push(Multiaddr::from_bytes(raw).map_err(|_| codes.invalid)?);
    }
    Ok(PeerInfo::with_addrs(id, addrs))
}

/// Validate destination then source; returns `(src, dst)`.
///
/// A HOP must name at least one destination address.
pub fn validate_message(
    msg: &CircuitRelay,
    phase: Phase,
    max_addr_len: usize,
) -> Result<(PeerInfo, PeerInfo), Status> {
    let dst = validate_peer(msg.dst_peer.as_ref(), phase.dst(), phase == Phase::Hop, max_addr_len)?;
    let src = validate_peer(msg.src_peer.as_ref(), phase.src(), false, max_addr_len)?;
    Ok((src, dst))
}
