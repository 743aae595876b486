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

//! Frame header codec.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::MuxError;
use crate::framing::varint::{self, VarintError};

/// Wire flag. `*Initiator` is sent by the side that opened the stream,
/// `*Receiver` by the other one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Flag {
    /// Open a stream; payload is its name.
    NewStream = 0,
    /// Data from the receiver.
    MessageReceiver = 1,
    /// Data from the initiator.
    MessageInitiator = 2,
    /// Half-close from the receiver.
    CloseReceiver = 3,
    /// Half-close from the initiator.
    CloseInitiator = 4,
    /// Reset from the receiver.
    ResetReceiver = 5,
    /// Reset from the initiator.
    ResetInitiator = 6,
}

/// What a flag means regardless of direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// NEW.
    New,
    /// DATA.
    Data,
    /// CLOSE.
    Close,
    /// RESET.
    Reset,
}

impl Flag {
    /// Parse the low three header bits.
    pub fn from_bits(bits: u64) -> Result<Self, MuxError> {
        Ok(match bits {
            0 => Flag::NewStream,
            1 => Flag::MessageReceiver,
            2 => Flag::MessageInitiator,
            3 => Flag::CloseReceiver,
            4 => Flag::CloseInitiator,
            5 => Flag::ResetReceiver,
            6 => Flag::ResetInitiator,
            other => return Err(MuxError::InvalidFlag(other)),
        })
    }

    /// Direction-free meaning.
    pub fn kind(self) -> FrameKind {
        match self {
            Flag::NewStream => FrameKind::New,
            Flag::MessageReceiver | Flag::MessageInitiator => FrameKind::Data,
            Flag::CloseReceiver | Flag::CloseInitiator => FrameKind::Close,
            Flag::ResetReceiver | Flag::ResetInitiator => FrameKind::Reset,
        }
    }

    /// Flag a sender uses for `kind`; `initiator` is whether it opened the stream.
    pub fn for_kind(kind: FrameKind, initiator: bool) -> Self {
        match (kind, initiator) {
            (FrameKind::New, _) => Flag::NewStream,
            (FrameKind::Data, true) => Flag::MessageInitiator,
            (FrameKind::Data, false) => Flag::MessageReceiver,
            (FrameKind::Close, true) => Flag::CloseInitiator,
            (FrameKind::Close, false) => Flag::CloseReceiver,
            (FrameKind::Reset, true) => Flag::ResetInitiator,
            (FrameKind::Reset, false) => Flag::ResetReceiver,
        }
    }
}

/// One muxer frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Stream id.
    pub stream_id: u64,
    /// Flag.
    pub flag: Flag,
    /// Payload (NEW: stream name, DATA: bytes, otherwise empty).
    pub payload: Bytes,
}

impl Frame {
    /// Frame with an empty payload.
    pub fn control(stream_id: u64, kind: FrameKind, initiator: bool) -> Self {
        Self { stream_id, flag: Flag::for_kind(kind, initiator), payload: Bytes::new() }
    }
}

/// `tokio_util` codec for [`Frame`].
#[derive(Clone, Debug)]
pub struct MuxCodec {
    max_frame_len: usize,
}

impl MuxCodec {
    /// Codec rejecting payloads above `max_frame_len`.
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }
}

fn partial(res: Result<(u64, usize), VarintError>) -> Result<Option<(u64, usize)>, MuxError> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(VarintError::Incomplete) => Ok(None),
        Err(VarintError::Overflow) => Err(MuxError::InvalidVarint),
    }
}

impl Decoder for MuxCodec {
    type Item = Frame;
    type Error = MuxError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, MuxError> {
        let Some((header, h_len)) = partial(varint::decode(src))? else {
            return Ok(None);
        };
        let Some((len, l_len)) = partial(varint::decode(&src[h_len..]))? else {
            return Ok(None);
        };
        if len > self.max_frame_len as u64 {
            return Err(MuxError::TooLarge { len, max: self.max_frame_len });
        }
        let flag = Flag::from_bits(header & 0x7)?;
        let total = h_len + l_len + len as usize;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        src.advance(h_len + l_len);
        let payload = src.split_to(len as usize).freeze();
        Ok(Some(Frame { stream_id: header >> 3, flag, payload }))
    }
}

impl Encoder<Frame> for MuxCodec {
    type Error = MuxError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), MuxError> {
        let len = frame.payload.len();
        if len > self.max_frame_len {
            return Err(MuxError::TooLarge { len: len as u64, max: self.max_frame_len });
        }
        dst.reserve(2 * varint::MAX_LEN + len);
        varint::encode_into(frame.stream_id << 3 | frame.flag as u64, dst);
        varint::encode_into(len as u64, dst);
        dst.put(frame.payload);
        Ok(())
    }
}
