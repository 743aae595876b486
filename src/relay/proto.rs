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

//! Relay wire message (protobuf, proto2).
//!
//! ```text
//! message CircuitRelay {
//!   optional Type type = 1;
//!   optional Peer srcPeer = 2;
//!   optional Peer dstPeer = 3;
//!   optional Status code = 4;
//! }
//! message Peer { required bytes id = 1; repeated bytes addrs = 2; }
//! ```

use std::fmt;

use crate::peer::PeerInfo;

/// Relay message.
#[derive(Clone, PartialEq, prost::Message)]
pub struct CircuitRelay {
    /// [`MessageType`] as i32.
    #[prost(enumeration = "MessageType", optional, tag = "1")]
    pub r#type: Option<i32>,
    /// Source peer.
    #[prost(message, optional, tag = "2")]
    pub src_peer: Option<Peer>,
    /// Destination peer.
    #[prost(message, optional, tag = "3")]
    pub dst_peer: Option<Peer>,
    /// [`Status`] as i32.
    #[prost(enumeration = "Status", optional, tag = "4")]
    pub code: Option<i32>,
}

/// Peer record inside a message.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Peer {
    /// PeerId bytes (multihash).
    #[prost(bytes = "vec", required, tag = "1")]
    pub id: Vec<u8>,
    /// Binary multiaddrs.
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub addrs: Vec<Vec<u8>>,
}

/// Message type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum MessageType {
    /// Source asks the relay for a circuit.
    Hop = 1,
    /// Relay asks the destination to accept a circuit.
    Stop = 2,
    /// Reply carrying a [`Status`].
    Status = 3,
    /// Capability probe.
    CanHop = 4,
}

/// Outcome code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Status {
    /// Success.
    Success = 100,
    /// A source address is too long.
    HopSrcAddrTooLong = 220,
    /// A destination address is too long.
    HopDstAddrTooLong = 221,
    /// A source address does not parse.
    HopSrcMultiaddrInvalid = 250,
    /// A destination address does not parse, or there is none.
    HopDstMultiaddrInvalid = 251,
    /// Relay holds no connection to the destination.
    HopNoConnToDst = 260,
    /// Relay failed to dial the destination.
    HopCantDialDst = 261,
    /// Relay failed to open a stream to the destination.
    HopCantOpenDstStream = 262,
    /// Peer does not act as a relay, or the destination does not speak it.
    HopCantSpeakRelay = 270,
    /// Destination is the relay itself.
    HopCantRelayToSelf = 280,
    /// A source address is too long (STOP).
    StopSrcAddrTooLong = 320,
    /// A destination address is too long (STOP).
    StopDstAddrTooLong = 321,
    /// A source address does not parse (STOP).
    StopSrcMultiaddrInvalid = 350,
    /// A destination address does not parse (STOP).
    StopDstMultiaddrInvalid = 351,
    /// Destination refuses relayed connections.
    StopRelayRefused = 390,
    /// Undecodable or out-of-place message.
    MalformedMessage = 400,
}

impl Status {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::HopSrcAddrTooLong => "HOP_SRC_ADDR_TOO_LONG",
            Status::HopDstAddrTooLong => "HOP_DST_ADDR_TOO_LONG",
            Status::HopSrcMultiaddrInvalid => "HOP_SRC_MULTIADDR_INVALID",
            Status::HopDstMultiaddrInvalid => "HOP_DST_MULTIADDR_INVALID",
            Status::HopNoConnToDst => "HOP_NO_CONN_TO_DST",
            Status::HopCantDialDst => "HOP_CANT_DIAL_DST",
            Status::HopCantOpenDstStream => "HOP_CANT_OPEN_DST_STREAM",
            Status::HopCantSpeakRelay => "HOP_CANT_SPEAK_RELAY",
            Status::HopCantRelayToSelf => "HOP_CANT_RELAY_TO_SELF",
            Status::StopSrcAddrTooLong => "STOP_SRC_ADDR_TOO_LONG",
            Status::StopDstAddrTooLong => "STOP_DST_ADDR_TOO_LONG",
            Status::StopSrcMultiaddrInvalid => "STOP_SRC_MULTIADDR_INVALID",
            Status::StopDstMultiaddrInvalid => "STOP_DST_MULTIADDR_INVALID",
            Status::StopRelayRefused => "STOP_RELAY_REFUSED",
            Status::MalformedMessage => "MALFORMED_MESSAGE",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), *self as i32)
    }
}

impl From<&PeerInfo> for Peer {
    fn from(info: &PeerInfo) -> Self {
        Self {
            id: info.id().as_bytes().to_vec(),
            addrs: info.addrs().iter().map(|a| a.to_bytes()).collect(),
        }
    }
}

impl CircuitRelay {
    /// STATUS reply.
    pub fn status(code: Status) -> Self {
        Self { r#type: Some(MessageType::Status as i32), code: Some(code as i32), ..Default::default() }
    }

    /// HOP request.
    pub fn hop(src: &PeerInfo, dst: &PeerInfo) -> Self {
        Self {
            r#type: Some(MessageType::Hop as i32),
            src_peer: Some(src.into()),
            dst_peer: Some(dst.into()),
            code: None,
        }
    }

    /// STOP request carrying the HOP's peers verbatim.
    pub fn stop(src: Option<Peer>, dst: Option<Peer>) -> Self {
        Self { r#type: Some(MessageType::Stop as i32), src_peer: src, dst_peer: dst, code: None }
    }

    /// CAN_HOP probe.
    pub fn can_hop() -> Self {
        Self { r#type: Some(MessageType::CanHop as i32), ..Default::default() }
    }

    /// Decoded type, `None` when absent or unknown.
    pub fn message_type(&self) -> Option<MessageType> {
        self.r#type.and_then(|t| MessageType::try_from(t).ok())
    }

    /// Decoded status, `None` when absent or unknown.
    pub fn status_code(&self) -> Option<Status> {
        self.code.and_then(|c| Status::try_from(c).ok())
    }
}
