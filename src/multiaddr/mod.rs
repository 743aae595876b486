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

//! Self-describing network addresses.
//!
//! ## Binary form
//! A multiaddr is a concatenation of segments:
//!
//! ```text
//! varint(code) || value
//! ```
//!
//! where `value` is fixed width (ip4, ip6, ports), empty (flag protocols such as
//! `p2p-circuit`) or `varint(len) || bytes` (dns names, peer ids, unix paths).
//!
//! The binary form is canonical: equality and hashing are defined over it.
//! The text form (`/ip4/1.2.3.4/tcp/4001`) is a lossless projection.

pub mod protocol;

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::framing::varint;
use crate::peer::PeerId;

pub use protocol::{Protocol, Size};

/// Multiaddr parse/encode errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Text address does not start with `/`.
    #[error("invalid address: must begin with /")]
    MissingLeadingSlash,
    /// Unknown protocol name in text form.
    #[error("unknown protocol {0}")]
    UnknownProtocol(String),
    /// Unknown protocol code in binary form.
    #[error("unknown protocol code {0}")]
    UnknownCode(u64),
    /// Protocol requires a value but none followed.
    #[error("invalid address: missing value for {0}")]
    MissingValue(&'static str),
    /// Value does not parse for its protocol.
    #[error("invalid value for {protocol}: {value}")]
    InvalidValue {
        /// Protocol name.
        protocol: &'static str,
        /// Offending value.
        value: String,
    },
    /// Binary address ended in the middle of a segment.
    #[error("invalid address buffer: truncated")]
    Truncated,
    /// Multihash header does not agree with the value length.
    #[error("inconsistent length for {0}")]
    InconsistentLength(&'static str),
    /// `decapsulate` target is not part of the address.
    #[error("address does not contain subaddress {0}")]
    NotContained(String),
}

/// One `(protocol, value)` pair. The value is kept in binary form.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Segment {
    code: u32,
    value: Vec<u8>,
}

impl Segment {
    /// Build a segment from a protocol code and its binary value.
    pub fn new(code: u32, value: Vec<u8>) -> Result<Self, AddressError> {
        let proto = Protocol::by_code(code).ok_or(AddressError::UnknownCode(u64::from(code)))?;
        match proto.size {
            Size::Zero if !value.is_empty() => {
                return Err(AddressError::InvalidValue {
                    protocol: proto.name,
                    value: hex::encode(&value),
                })
            }
            Size::Zero => {}
            _ => proto.check_bytes(&value)?,
        }
        Ok(Self { code, value })
    }

    /// Parse `name` + text value.
    pub fn from_text(name: &str, value: &str) -> Result<Self, AddressError> {
        let proto =
            Protocol::by_name(name).ok_or_else(|| AddressError::UnknownProtocol(name.to_string()))?;
        Ok(Self { code: proto.code, value: proto.text_to_bytes(value)? })
    }

    /// Flag segment (no value), e.g. `p2p-circuit`.
    pub fn flag(code: u32) -> Result<Self, AddressError> {
        Self::new(code, Vec::new())
    }

    /// Protocol code.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// Protocol descriptor.
    pub fn protocol(&self) -> &'static Protocol {
        // Segments are only constructed for codes present in the table.
        Protocol::by_code(self.code).unwrap_or(&Protocol::all()[0])
    }

    /// Binary value.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Text value (`None` for flag protocols).
    pub fn value_text(&self) -> Option<String> {
        let proto = self.protocol();
        if proto.size == Size::Zero {
            return None;
        }
        proto.bytes_to_text(&self.value).ok()
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value_text() {
            Some(v) => write!(f, "{}({})", self.protocol().name, v),
            None => write!(f, "{}", self.protocol().name),
        }
    }
}

/// Immutable ordered sequence of segments.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Multiaddr {
    segments: Vec<Segment>,
}

impl Multiaddr {
    /// The empty address `/`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from segments.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// `/p2p-circuit`.
    pub fn circuit() -> Self {
        Self { segments: vec![Segment { code: protocol::P2P_CIRCUIT, value: Vec::new() }] }
    }

    /// Decode the canonical binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        let mut segments = Vec::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            let (code, n) = varint::decode(rest).map_err(|_| AddressError::Truncated)?;
            rest = &rest[n..];
            let proto = u32::try_from(code)
                .ok()
                .and_then(Protocol::by_code)
                .ok_or(AddressError::UnknownCode(code))?;
            let len = match proto.size {
                Size::Zero => 0,
                Size::Fixed(n) => n,
                Size::Variable => {
                    let (len, n) = varint::decode(rest).map_err(|_| AddressError::Truncated)?;
                    rest = &rest[n..];
                    usize::try_from(len).map_err(|_| AddressError::Truncated)?
                }
            };
            if rest.len() < len {
                return Err(AddressError::Truncated);
            }
            let value = rest[..len].to_vec();
            rest = &rest[len..];
            if proto.size != Size::Zero {
                proto.check_bytes(&value)?;
            }
            segments.push(Segment { code: proto.code, value });
        }
        Ok(Self { segments })
    }

    /// Encode into the canonical binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for seg in &self.segments {
            seg.protocol().write_segment(&seg.value, &mut out);
        }
        out
    }

    /// Segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Iterate segments.
    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True for `/`.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Ordered protocol descriptors.
    pub fn protocols(&self) -> Vec<&'static Protocol> {
        self.segments.iter().map(Segment::protocol).collect()
    }

    /// Append a segment.
    pub fn push(&mut self, seg: Segment) {
        self.segments.push(seg);
    }

    /// Returns `self` followed by `other`.
    pub fn encapsulate(&self, other: &Multiaddr) -> Multiaddr {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Strip the last occurrence of `other` and everything after it.
    pub fn decapsulate(&self, other: &Multiaddr) -> Result<Multiaddr, AddressError> {
        let n = other.segments.len();
        if n == 0 || n > self.segments.len() {
            return Err(AddressError::NotContained(other.to_string()));
        }
        (0..=self.segments.len() - n)
            .rev()
            .find(|&i| self.segments[i..i + n] == other.segments[..])
            .map(|i| Self { segments: self.segments[..i].to_vec() })
            .ok_or_else(|| AddressError::NotContained(other.to_string()))
    }

    /// Strip the last segment with protocol `code` and everything after it.
    pub fn decapsulate_code(&self, code: u32) -> Result<Multiaddr, AddressError> {
        self.segments
            .iter()
            .rposition(|s| s.code == code)
            .map(|i| Self { segments: self.segments[..i].to_vec() })
            .ok_or_else(|| {
                let name = Protocol::by_code(code).map(|p| p.name).unwrap_or("?");
                AddressError::NotContained(format!("/{name}"))
            })
    }

    /// Peer id carried by the last `ipfs` segment.
    pub fn peer_id(&self) -> Option<PeerId> {
        self.segments
            .iter()
            .rev()
            .find(|s| s.code == protocol::IPFS)
            .and_then(|s| PeerId::from_bytes(&s.value).ok())
    }

    /// Returns a copy with `/ipfs/<id>` appended.
    pub fn with_peer_id(&self, id: &PeerId) -> Multiaddr {
        let mut out = self.clone();
        out.segments.push(Segment { code: protocol::IPFS, value: id.as_bytes().to_vec() });
        out
    }

    /// True when the address contains `p2p-circuit`.
    pub fn is_circuit(&self) -> bool {
        self.segments.iter().any(|s| s.code == protocol::P2P_CIRCUIT)
    }

    /// Split at the first `p2p-circuit` into `(relay part, destination part)`.
    pub fn split_circuit(&self) -> Option<(Multiaddr, Multiaddr)> {
        let i = self.segments.iter().position(|s| s.code == protocol::P2P_CIRCUIT)?;
        Some((
            Self { segments: self.segments[..i].to_vec() },
            Self { segments: self.segments[i + 1..].to_vec() },
        ))
    }

    /// Exactly `{ip4|ip6}/{tcp|udp}`.
    pub fn is_thin_waist(&self) -> bool {
        matches!(
            (self.segments.first().map(|s| s.code), self.segments.get(1).map(|s| s.code)),
            (Some(protocol::IP4 | protocol::IP6), Some(protocol::TCP | protocol::UDP))
        ) && self.segments.len() == 2
    }

    /// Socket address of a thin-waist address.
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        if !self.is_thin_waist() {
            return None;
        }
        let ip: IpAddr = match self.segments[0].code {
            protocol::IP4 => IpAddr::V4(<[u8; 4]>::try_from(&self.segments[0].value[..]).ok()?.into()),
            _ => IpAddr::V6(<[u8; 16]>::try_from(&self.segments[0].value[..]).ok()?.into()),
        };
        let port = u16::from_be_bytes(<[u8; 2]>::try_from(&self.segments[1].value[..]).ok()?);
        Some(SocketAddr::new(ip, port))
    }

    /// Build `/ip{4,6}/<ip>/<transport>/<port>`; `transport_code` is tcp or udp.
    pub fn from_socket_addr(addr: SocketAddr, transport_code: u32) -> Result<Self, AddressError> {
        let ip = match addr.ip() {
            IpAddr::V4(v4) => Segment::new(protocol::IP4, v4.octets().to_vec())?,
            IpAddr::V6(v6) => Segment::new(protocol::IP6, v6.octets().to_vec())?,
        };
        if transport_code != protocol::TCP && transport_code != protocol::UDP {
            return Err(AddressError::UnknownCode(u64::from(transport_code)));
        }
        let port = Segment::new(transport_code, addr.port().to_be_bytes().to_vec())?;
        Ok(Self { segments: vec![ip, port] })
    }
}

impl FromStr for Multiaddr {
    type Err = AddressError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if text.is_empty() || text == "/" {
            return Ok(Self::empty());
        }
        let rest = text.strip_prefix('/').ok_or(AddressError::MissingLeadingSlash)?;
        let mut tokens = rest.split('/').filter(|t| !t.is_empty()).peekable();
        let mut segments = Vec::new();
        while let Some(name) = tokens.next() {
            let proto =
                Protocol::by_name(name).ok_or_else(|| AddressError::UnknownProtocol(name.to_string()))?;
            let value = match proto.size {
                Size::Zero => Vec::new(),
                _ if proto.is_path() => {
                    let path: Vec<&str> = tokens.by_ref().collect();
                    if path.is_empty() {
                        return Err(AddressError::MissingValue(proto.name));
                    }
                    proto.text_to_bytes(&format!("/{}", path.join("/")))?
                }
                _ => {
                    let v = tokens.next().ok_or(AddressError::MissingValue(proto.name))?;
                    proto.text_to_bytes(v)?
                }
            };
            segments.push(Segment { code: proto.code, value });
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for seg in &self.segments {
            let proto = seg.protocol();
            write!(f, "/{}", proto.name)?;
            if proto.size != Size::Zero {
                let text = proto.bytes_to_text(&seg.value).map_err(|_| fmt::Error)?;
                if proto.is_path() {
                    // Paths carry their own leading slash.
                    f.write_str(&text)?;
                } else {
                    write!(f, "/{text}")?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Multiaddr {} - {}>", hex::encode(self.to_bytes()), self)
    }
}

impl TryFrom<&[u8]> for Multiaddr {
    type Error = AddressError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl TryFrom<&str> for Multiaddr {
    type Error = AddressError;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl Serialize for Multiaddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Multiaddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
