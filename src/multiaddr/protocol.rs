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

//! Multiaddr protocol table.
//!
//! Each entry owns a code, a text name and a codec converting the value
//! between its text and binary forms.

use std::net::{Ipv4Addr, Ipv6Addr};

use super::AddressError;
use crate::framing::varint;
use crate::peer::is_multihash;

/// `ip4` protocol code.
pub const IP4: u32 = 4;
/// `tcp` protocol code.
pub const TCP: u32 = 6;
/// `dccp` protocol code.
pub const DCCP: u32 = 33;
/// `ip6` protocol code.
pub const IP6: u32 = 41;
/// `dns` protocol code.
pub const DNS: u32 = 53;
/// `dns4` protocol code.
pub const DNS4: u32 = 54;
/// `dns6` protocol code.
pub const DNS6: u32 = 55;
/// `dnsaddr` protocol code.
pub const DNSADDR: u32 = 56;
/// `sctp` protocol code.
pub const SCTP: u32 = 132;
/// `udp` protocol code.
pub const UDP: u32 = 273;
/// `p2p-webrtc-star` protocol code.
pub const P2P_WEBRTC_STAR: u32 = 275;
/// `p2p-webrtc-direct` protocol code.
pub const P2P_WEBRTC_DIRECT: u32 = 276;
/// `p2p-circuit` protocol code.
pub const P2P_CIRCUIT: u32 = 290;
/// `udt` protocol code.
pub const UDT: u32 = 301;
/// `utp` protocol code.
pub const UTP: u32 = 302;
/// `unix` protocol code.
pub const UNIX: u32 = 400;
/// `ipfs` (alias `p2p`) protocol code.
pub const IPFS: u32 = 421;
/// `https` protocol code.
pub const HTTPS: u32 = 443;
/// `quic` protocol code.
pub const QUIC: u32 = 460;
/// `ws` protocol code.
pub const WS: u32 = 477;
/// `wss` protocol code.
pub const WSS: u32 = 478;
/// `p2p-websocket-star` protocol code.
pub const P2P_WEBSOCKET_STAR: u32 = 479;
/// `http` protocol code.
pub const HTTP: u32 = 480;

/// Binary size class of a protocol value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Size {
    /// Flag protocol: no value at all.
    Zero,
    /// Fixed number of bytes.
    Fixed(usize),
    /// Varint length prefix followed by the bytes.
    Variable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Codec {
    None,
    Ip4,
    Ip6,
    Port,
    Utf8,
    Multihash,
    Path,
}

/// One row of the protocol table.
#[derive(Debug, PartialEq, Eq)]
pub struct Protocol {
    /// Multicodec code.
    pub code: u32,
    /// Canonical text name.
    pub name: &'static str,
    /// Value size class.
    pub size: Size,
    /// Whether the value is a name needing resolution before dialing.
    pub resolvable: bool,
    codec: Codec,
}

const fn proto(code: u32, name: &'static str, size: Size, codec: Codec) -> Protocol {
    Protocol { code, name, size, resolvable: false, codec }
}

const fn resolvable(code: u32, name: &'static str) -> Protocol {
    Protocol { code, name, size: Size::Variable, resolvable: true, codec: Codec::Utf8 }
}

static TABLE: &[Protocol] = &[
    proto(IP4, "ip4", Size::Fixed(4), Codec::Ip4),
    proto(TCP, "tcp", Size::Fixed(2), Codec::Port),
    proto(DCCP, "dccp", Size::Fixed(2), Codec::Port),
    proto(IP6, "ip6", Size::Fixed(16), Codec::Ip6),
    resolvable(DNS, "dns"),
    resolvable(DNS4, "dns4"),
    resolvable(DNS6, "dns6"),
    resolvable(DNSADDR, "dnsaddr"),
    proto(SCTP, "sctp", Size::Fixed(2), Codec::Port),
    proto(UDP, "udp", Size::Fixed(2), Codec::Port),
    proto(P2P_WEBRTC_STAR, "p2p-webrtc-star", Size::Zero, Codec::None),
    proto(P2P_WEBRTC_DIRECT, "p2p-webrtc-direct", Size::Zero, Codec::None),
    proto(P2P_CIRCUIT, "p2p-circuit", Size::Zero, Codec::None),
    proto(UDT, "udt", Size::Zero, Codec::None),
    proto(UTP, "utp", Size::Zero, Codec::None),
    proto(UNIX, "unix", Size::Variable, Codec::Path),
    proto(IPFS, "ipfs", Size::Variable, Codec::Multihash),
    proto(HTTPS, "https", Size::Zero, Codec::None),
    proto(QUIC, "quic", Size::Zero, Codec::None),
    proto(WS, "ws", Size::Zero, Codec::None),
    proto(WSS, "wss", Size::Zero, Codec::None),
    proto(P2P_WEBSOCKET_STAR, "p2p-websocket-star", Size::Zero, Codec::None),
    proto(HTTP, "http", Size::Zero, Codec::None),
];

impl Protocol {
    /// All known protocols.
    pub fn all() -> &'static [Protocol] {
        TABLE
    }

    /// Look up by multicodec code.
    pub fn by_code(code: u32) -> Option<&'static Protocol> {
        TABLE.iter().find(|p| p.code == code)
    }

    /// Look up by text name (`p2p` resolves to `ipfs`) or decimal code.
    pub fn by_name(name: &str) -> Option<&'static Protocol> {
        let name = if name == "p2p" { "ipfs" } else { name };
        if let Some(p) = TABLE.iter().find(|p| p.name == name) {
            return Some(p);
        }
        name.parse::<u32>().ok().and_then(Self::by_code)
    }

    /// True when the value is the remainder of the text address (`unix`).
    pub(crate) fn is_path(&self) -> bool {
        self.codec == Codec::Path
    }

    /// Convert a text value into its binary form (without length prefix).
    pub fn text_to_bytes(&self, text: &str) -> Result<Vec<u8>, AddressError> {
        let invalid = || AddressError::InvalidValue {
            protocol: self.name,
            value: text.to_string(),
        };
        match self.codec {
            Codec::None => Ok(Vec::new()),
            Codec::Ip4 => {
                let ip: Ipv4Addr = text.parse().map_err(|_| invalid())?;
                Ok(ip.octets().to_vec())
            }
            Codec::Ip6 => {
                let ip: Ipv6Addr = text.parse().map_err(|_| invalid())?;
                Ok(ip.octets().to_vec())
            }
            Codec::Port => {
                let port: u16 = text.parse().map_err(|_| invalid())?;
                Ok(port.to_be_bytes().to_vec())
            }
            Codec::Utf8 | Codec::Path => {
                let bytes = text.as_bytes().to_vec();
                self.check_bytes(&bytes)?;
                Ok(bytes)
            }
            Codec::Multihash => {
                let bytes = bs58::decode(text).into_vec().map_err(|_| invalid())?;
                if !is_multihash(&bytes) {
                    return Err(AddressError::InconsistentLength(self.name));
                }
                Ok(bytes)
            }
        }
    }

    /// Render a binary value (without length prefix) as text.
    pub fn bytes_to_text(&self, bytes: &[u8]) -> Result<String, AddressError> {
        let invalid = || AddressError::InvalidValue {
            protocol: self.name,
            value: hex::encode(bytes),
        };
        match self.codec {
            Codec::None => Ok(String::new()),
            Codec::Ip4 => {
                let octets: [u8; 4] = bytes.try_into().map_err(|_| invalid())?;
                Ok(Ipv4Addr::from(octets).to_string())
            }
            Codec::Ip6 => {
                let octets: [u8; 16] = bytes.try_into().map_err(|_| invalid())?;
                Ok(Ipv6Addr::from(octets).to_string())
            }
            Codec::Port => {
                let b: [u8; 2] = bytes.try_into().map_err(|_| invalid())?;
                Ok(u16::from_be_bytes(b).to_string())
            }
            Codec::Utf8 | Codec::Path => {
                let s = std::str::from_utf8(bytes).map_err(|_| invalid())?;
                Ok(s.to_string())
            }
            Codec::Multihash => {
                if !is_multihash(bytes) {
                    return Err(AddressError::InconsistentLength(self.name));
                }
                Ok(bs58::encode(bytes).into_string())
            }
        }
    }

    /// Validate a binary value read off the wire.
    pub(crate) fn check_bytes(&self, bytes: &[u8]) -> Result<(), AddressError> {
        let text = self.bytes_to_text(bytes)?;
        let ok = match self.codec {
            Codec::Utf8 => !text.is_empty() && !text.contains('/'),
            // the text form cannot carry empty components
            Codec::Path => text
                .strip_prefix('/')
                .is_some_and(|rest| rest.split('/').all(|c| !c.is_empty())),
            _ => true,
        };
        if !ok {
            return Err(AddressError::InvalidValue { protocol: self.name, value: text });
        }
        Ok(())
    }

    /// Append `code || [len] || value` to `out`.
    pub(crate) fn write_segment(&self, value: &[u8], out: &mut Vec<u8>) {
        varint::encode_into(u64::from(self.code), out);
        if self.size == Size::Variable {
            varint::encode_into(value.len() as u64, out);
        }
        out.extend_from_slice(value);
    }
}
