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

//! Length-prefixed relay message exchange over one stream.

use prost::Message as _;
use tokio::io::{AsyncRead, AsyncWrite};

use super::proto::CircuitRelay;
use super::RelayError;
use crate::framing::{read_frame, write_frame, FramingError};

/// Owns a stream while relay control messages are exchanged on it.
///
/// Reads consume exactly one frame each, so [`StreamHandler::into_inner`]
/// hands over a stream with nothing buffered.
#[derive(Debug)]
pub struct StreamHandler<S> {
    io: S,
    max_len: usize,
}

impl<S: AsyncRead + AsyncWrite + Unpin> StreamHandler<S> {
    /// Wrap `io`; messages above `max_len` are rejected both ways.
    pub fn new(io: S, max_len: usize) -> Self {
        Self { io, max_len }
    }

    /// Read and decode one message.
    pub async fn read(&mut self) -> Result<CircuitRelay, RelayError> {
        let payload = read_frame(&mut self.io, self.max_len).await?;
        Ok(CircuitRelay::decode(payload)?)
    }

    /// Encode and write one message.
    pub async fn write(&mut self, msg: &CircuitRelay) -> Result<(), RelayError> {
        let buf = msg.encode_to_vec();
        if buf.len() > self.max_len {
            return Err(FramingError::TooLarge { len: buf.len() as u64, max: self.max_len }.into());
        }
        write_frame(&mut self.io, &buf).await?;
        Ok(())
    }

    /// Release the stream.
    pub fn into_inner(self) -> S {
        self.io
    }
}
