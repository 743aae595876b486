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

//! Seam to the external switch, plus the relay capability book.

use std::io;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use thiserror::Error;

use crate::muxer::MuxError;
use crate::peer::{PeerId, PeerInfo};
use crate::stream::BoxedStream;

/// Switch errors.
#[derive(Debug, Error)]
pub enum SwitchError {
    /// No transport reaches the peer.
    #[error("peer unreachable: {0}")]
    Unreachable(PeerId),
    /// Transport I/O failure.
    #[error("io: {0}")]
    Io(#[from] io::Error),
    /// Muxed session failure.
    #[error("mux: {0}")]
    Mux(#[from] MuxError),
}

/// Raw dialing and connection bookkeeping, provided by the host.
#[async_trait]
pub trait Switch: Send + Sync {
    /// Our own identity and addresses.
    fn local_peer(&self) -> PeerInfo;

    /// Whether a live connection to `peer` exists.
    fn is_connected(&self, peer: &PeerId) -> bool;

    /// A fresh, unnegotiated stream to `peer`, reusing a live connection when
    /// there is one.
    async fn dial(&self, peer: &PeerInfo) -> Result<BoxedStream, SwitchError>;
}

/// Peers that answered CAN_HOP with SUCCESS, in discovery order.
#[derive(Debug, Default)]
pub struct RelayBook {
    peers: RwLock<Vec<PeerInfo>>,
}

impl RelayBook {
    /// Empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `peer`, merging addresses when it is already known.
    pub fn insert(&self, peer: PeerInfo) {
        let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
        match peers.iter_mut().find(|p| p.id() == peer.id()) {
            Some(known) => known.merge(&peer),
            None => peers.push(peer),
        }
    }

    /// Forget `id`.
    pub fn remove(&self, id: &PeerId) -> bool {
        let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
        let before = peers.len();
        peers.retain(|p| p.id() != id);
        peers.len() != before
    }

    /// Whether `id` is a known relay.
    pub fn contains(&self, id: &PeerId) -> bool {
        self.peers.read().unwrap_or_else(PoisonError::into_inner).iter().any(|p| p.id() == id)
    }

    /// Copy of the current entries.
    pub fn snapshot(&self) -> Vec<PeerInfo> {
        self.peers.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of known relays.
    pub fn len(&self) -> usize {
        self.peers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when no relay is known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
