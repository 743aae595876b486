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

//! Duplex stream capabilities shared by every stream kind.
//!
//! Read, write and close come from tokio's `AsyncRead`/`AsyncWrite`
//! (`poll_shutdown` is the half-close). [`Endpoint`] adds addressing.
//! Direct, relayed and muxed streams all compose these instead of sharing a
//! base type.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::multiaddr::Multiaddr;
use crate::peer::PeerId;

/// Any owned, sendable duplex byte stream.
pub trait Duplex: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Duplex for T {}

/// Type-erased duplex stream.
pub type BoxedStream = Box<dyn Duplex>;

impl std::fmt::Debug for dyn Duplex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Duplex")
    }
}

/// Addressing capability.
pub trait Endpoint {
    /// Address the remote side is observed at.
    fn remote_addr(&self) -> Option<&Multiaddr>;
    /// Identity of the remote side, when known.
    fn remote_peer(&self) -> Option<&PeerId>;
}

/// How a [`Connection`] reached us.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Handed over by the switch as-is.
    Direct,
    /// Spliced through a circuit relay.
    Relayed,
    /// A logical stream of a muxed session.
    Muxed,
}

/// A duplex stream plus what is known about its remote end.
pub struct Connection {
    io: BoxedStream,
    kind: ConnectionKind,
    remote_addr: Option<Multiaddr>,
    remote_peer: Option<PeerId>,
}

impl Connection {
    /// Wrap a stream.
    pub fn new(io: BoxedStream, kind: ConnectionKind) -> Self {
        Self { io, kind, remote_addr: None, remote_peer: None }
    }

    /// Tag with the observed remote address.
    pub fn with_remote_addr(mut self, addr: Multiaddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Tag with the remote identity.
    pub fn with_remote_peer(mut self, peer: PeerId) -> Self {
        self.remote_peer = Some(peer);
        self
    }

    /// Stream kind.
    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// Unwrap the raw stream.
    pub fn into_inner(self) -> BoxedStream {
        self.io
    }
}

impl Endpoint for Connection {
    fn remote_addr(&self) -> Option<&Multiaddr> {
        self.remote_addr.as_ref()
    }

    fn remote_peer(&self) -> Option<&PeerId> {
        self.remote_peer.as_ref()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("kind", &self.kind)
            .field("remote_addr", &self.remote_addr)
            .field("remote_peer", &self.remote_peer)
            .finish()
    }
}

impl AsyncRead for Connection {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_read(cx, buf)
    }
}

impl AsyncWrite for Connection {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.io).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_shutdown(cx)
    }
}
