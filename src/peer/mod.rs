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

//! Peer identity and known addresses.

pub mod identity;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::framing::varint;
use crate::multiaddr::Multiaddr;

/// Largest accepted multihash (code + length + 64 byte digest, with slack).
const MAX_PEER_ID_LEN: usize = 128;

/// Peer id errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerIdError {
    /// Not base58.
    #[error("invalid base58 peer id")]
    Base58,
    /// Bytes are not a well-formed multihash.
    #[error("invalid multihash")]
    Multihash,
}

/// True when `bytes` is `varint(code) || varint(len) || digest` with `len == digest.len()`.
pub fn is_multihash(bytes: &[u8]) -> bool {
    if bytes.is_empty() || bytes.len() > MAX_PEER_ID_LEN {
        return false;
    }
    let Ok((_, n)) = varint::decode(bytes) else {
        return false;
    };
    let Ok((len, m)) = varint::decode(&bytes[n..]) else {
        return false;
    };
    (bytes.len() - n - m) as u64 == len
}

/// Immutable peer identity: the multihash of a public key.
///
/// Cloning shares the underlying bytes; comparison is by byte equality.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(Arc<[u8]>);

impl PeerId {
    /// Wrap multihash bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PeerIdError> {
        if !is_multihash(bytes) {
            return Err(PeerIdError::Multihash);
        }
        Ok(Self(Arc::from(bytes)))
    }

    /// Derive from a public key.
    pub fn from_public_key(key: &libp2p::identity::PublicKey) -> Self {
        Self::from(libp2p::PeerId::from_public_key(key))
    }

    /// Parse the base58 text form.
    pub fn from_base58(s: &str) -> Result<Self, PeerIdError> {
        let bytes = bs58::decode(s).into_vec().map_err(|_| PeerIdError::Base58)?;
        Self::from_bytes(&bytes)
    }

    /// Base58 text form.
    pub fn to_base58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    /// Raw multihash bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<libp2p::PeerId> for PeerId {
    fn from(id: libp2p::PeerId) -> Self {
        Self(Arc::from(id.to_bytes()))
    }
}

impl FromStr for PeerId {
    type Err = PeerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.to_base58())
    }
}

/// A peer and the de-duplicated addresses it is known to be reachable at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    id: PeerId,
    addrs: Vec<Multiaddr>,
}

impl PeerInfo {
    /// Peer with no known addresses.
    pub fn new(id: PeerId) -> Self {
        Self { id, addrs: Vec::new() }
    }

    /// Peer with an initial address list (duplicates dropped, order kept).
    pub fn with_addrs(id: PeerId, addrs: impl IntoIterator<Item = Multiaddr>) -> Self {
        let mut info = Self::new(id);
        for a in addrs {
            info.add_addr(a);
        }
        info
    }

    /// Identity.
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// Known addresses in insertion order.
    pub fn addrs(&self) -> &[Multiaddr] {
        &self.addrs
    }

    /// Add an address; returns false if it was already known.
    pub fn add_addr(&mut self, addr: Multiaddr) -> bool {
        if self.addrs.contains(&addr) {
            return false;
        }
        self.addrs.push(addr);
        true
    }

    /// Forget an address; returns false if it was unknown.
    pub fn remove_addr(&mut self, addr: &Multiaddr) -> bool {
        let before = self.addrs.len();
        self.addrs.retain(|a| a != addr);
        self.addrs.len() != before
    }

    /// Merge the addresses of `other` (same peer) into `self`.
    pub fn merge(&mut self, other: &PeerInfo) {
        for a in &other.addrs {
            self.add_addr(a.clone());
        }
    }
}
