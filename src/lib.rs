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
#![warn(missing_docs)]

//! Hopwire - peer-to-peer transport core.
//!
//! This crate provides:
//! - Self-describing network addresses (multiaddr) with a canonical binary form
//! - Length-prefixed framing over any async duplex stream
//! - Protocol negotiation (multistream-select 1.0.0) with exact, semver and custom matching
//! - A stream multiplexer turning one connection into many logical streams
//! - Circuit relay (HOP/STOP) with a dial-side Connector and accept-side Listener
//! - Monitoring via Prometheus metrics and structured logging

/// TOML node configuration.
pub mod config;
/// Caller-supplied deadlines and cancellation.
pub mod deadline;
/// Varint and length-prefixed frames.
pub mod framing;
/// Observability (metrics, structured logging helpers).
pub mod monitoring;
/// Multiaddr codec.
pub mod multiaddr;
/// Stream multiplexer.
pub mod muxer;
/// Multistream-select negotiation.
pub mod negotiation;
/// Peer identities and address books.
pub mod peer;
/// Circuit relay protocol.
pub mod relay;
/// Duplex stream capabilities.
pub mod stream;

pub use multiaddr::Multiaddr;
pub use peer::{PeerId, PeerInfo};
