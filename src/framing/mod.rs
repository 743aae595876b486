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

//! Length-prefixed framing over any duplex byte stream.
//!
//! Wire format: `varint(len) || payload`.
//!
//! Reads are exact: no byte past the end of a frame is consumed, so a stream
//! can be handed to another owner right after a control exchange without
//! losing data that the peer already pipelined behind it.

pub mod varint;

use std::io;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Framing errors.
#[derive(Debug, Error)]
pub enum FramingError {
    /// Underlying stream failed or ended inside a frame.
    #[error("io: {0}")]
    Io(#[from] io::Error),
    /// Stream ended cleanly at a frame boundary.
    #[error("stream closed")]
    Closed,
    /// Declared length exceeds the caller's cap.
    #[error("frame too large: {len} > {max}")]
    TooLarge {
        /// Declared length.
        len: u64,
        /// Cap.
        max: usize,
    },
    /// Length prefix is not a valid varint.
    #[error("invalid varint length prefix")]
    InvalidVarint,
}

/// Read one varint byte by byte. `Ok(None)` on EOF before the first byte.
pub async fn read_varint<R: AsyncRead + Unpin>(r: &mut R) -> Result<Option<u64>, FramingError> {
    let mut buf = [0u8; varint::MAX_LEN];
    for i in 0..varint::MAX_LEN {
        let mut b = [0u8; 1];
        let n = r.read(&mut b).await?;
        if n == 0 {
            if i == 0 {
                return Ok(None);
            }
            return Err(FramingError::Io(io::ErrorKind::UnexpectedEof.into()));
        }
        buf[i] = b[0];
        if b[0] & 0x80 == 0 {
            let (v, _) = varint::decode(&buf[..=i]).map_err(|_| FramingError::InvalidVarint)?;
            return Ok(Some(v));
        }
    }
    Err(FramingError::InvalidVarint)
}

/// Read one frame whose payload is at most `max` bytes.
pub async fn read_frame<R: AsyncRead + Unpin>(r: &mut R, max: usize) -> Result<Bytes, FramingError> {
    let len = read_varint(r).await?.ok_or(FramingError::Closed)?;
    if len > max as u64 {
        return Err(FramingError::TooLarge { len, max });
    }
    let mut payload = BytesMut::zeroed(len as usize);
    if len > 0 {
        r.read_exact(&mut payload).await?;
    }
    Ok(payload.freeze())
}

/// Prefix `payload` with its varint length.
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(varint::encoded_len(payload.len() as u64) + payload.len());
    varint::encode_into(payload.len() as u64, &mut buf);
    buf.extend_from_slice(payload);
    buf.freeze()
}

/// Write one frame and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(w: &mut W, payload: &[u8]) -> Result<(), FramingError> {
    w.write_all(&encode_frame(payload)).await?;
    w.flush().await?;
    Ok(())
}
