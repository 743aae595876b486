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

//! Stream multiplexer over one physical duplex connection.
//!
//! Frame layout (mplex compatible):
//!
//! ```text
//! varint(stream_id << 3 | flag) || varint(len) || payload
//! ```
//!
//! A [`Session`] owns the connection through two tasks: a reader that
//! demultiplexes frames into per-stream buffers and the single writer all
//! logical streams queue their frames to.

pub mod frame;
pub mod session;
pub mod stream;

use std::io;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use frame::{Flag, Frame, FrameKind, MuxCodec};
pub use session::{Role, Session};
pub use stream::{LogicalStream, StreamState};

/// Multiplexer errors.
#[derive(Debug, Error)]
pub enum MuxError {
    /// Physical connection failed.
    #[error("io: {0}")]
    Io(#[from] io::Error),
    /// Header carried a flag outside 0..=6.
    #[error("invalid frame flag {0}")]
    InvalidFlag(u64),
    /// Frame larger than the configured cap.
    #[error("frame too large: {len} > {max}")]
    TooLarge {
        /// Declared length.
        len: u64,
        /// Cap.
        max: usize,
    },
    /// Malformed varint in a header.
    #[error("invalid varint in frame header")]
    InvalidVarint,
    /// The session has ended.
    #[error("session closed")]
    SessionClosed,
}

/// Multiplexer limits.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MuxConfig {
    /// Largest frame payload, either direction.
    pub max_frame_len: usize,
    /// Inbound frames buffered per logical stream. A full buffer pauses the
    /// reader, which backs up the remote writer.
    pub stream_buffer: usize,
    /// How long the reader waits on a full stream buffer before resetting
    /// that stream.
    pub receive_timeout_ms: u64,
    /// Frames queued for the connection writer.
    pub write_queue: usize,
    /// Inbound streams not yet accepted before new ones are reset.
    pub accept_backlog: usize,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            max_frame_len: 1 << 20,
            stream_buffer: 64,
            receive_timeout_ms: 5_000,
            write_queue: 256,
            accept_backlog: 64,
        }
    }
}

impl MuxConfig {
    /// Wait allowed on a full stream buffer.
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}
