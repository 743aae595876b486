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

//! Line encoding.

use bytes::{BufMut, Bytes, BytesMut};

use super::NegotiationError;
use crate::framing::{encode_frame, varint};

/// Multistream-select header and protocol id.
pub const PROTOCOL_ID: &str = "/multistream/1.0.0";

const NA: &str = "na";
const LS: &str = "ls";

/// One negotiation message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// The `/multistream/1.0.0` header.
    Header,
    /// A proposal, or the listener's acceptance echo.
    Protocol(String),
    /// Rejection.
    Na,
    /// Request for the listener's protocol list.
    Ls,
    /// Answer to `ls`.
    List(Vec<String>),
}

impl Message {
    /// Encoded line, length prefix included.
    pub fn encode(&self) -> Bytes {
        match self {
            Message::Header => line(PROTOCOL_ID),
            Message::Protocol(p) => line(p),
            Message::Na => line(NA),
            Message::Ls => line(LS),
            Message::List(protocols) => {
                let mut inner = BytesMut::new();
                for p in protocols {
                    inner.put(line(p));
                }
                inner.put_u8(b'\n');
                encode_frame(&inner)
            }
        }
    }

    /// Length of the payload [`Message::encode`] would frame.
    pub fn payload_len(&self) -> usize {
        let text_len = |s: &str| s.len() + 1;
        match self {
            Message::Header => text_len(PROTOCOL_ID),
            Message::Protocol(p) => text_len(p),
            Message::Na => text_len(NA),
            Message::Ls => text_len(LS),
            Message::List(protocols) => {
                protocols
                    .iter()
                    .map(|p| {
                        let n = text_len(p);
                        varint::encoded_len(n as u64) + n
                    })
                    .sum::<usize>()
                    + 1
            }
        }
    }

    /// Decode one line frame payload.
    pub fn decode_line(payload: &[u8]) -> Result<Self, NegotiationError> {
        let body = payload
            .strip_suffix(b"\n")
            .ok_or(NegotiationError::InvalidMessage("missing newline"))?;
        let text =
            std::str::from_utf8(body).map_err(|_| NegotiationError::InvalidMessage("not utf-8"))?;
        Ok(match text {
            "" => return Err(NegotiationError::InvalidMessage("empty line")),
            PROTOCOL_ID => Message::Header,
            NA => Message::Na,
            LS => Message::Ls,
            p => Message::Protocol(p.to_string()),
        })
    }

    /// Decode an `ls` answer payload.
    pub fn decode_list(payload: &[u8]) -> Result<Self, NegotiationError> {
        let mut rest = payload
            .strip_suffix(b"\n")
            .ok_or(NegotiationError::InvalidMessage("missing list terminator"))?;
        let mut protocols = Vec::new();
        while !rest.is_empty() {
            let (len, used) = varint::decode(rest)
                .map_err(|_| NegotiationError::InvalidMessage("bad list entry length"))?;
            let end = usize::try_from(len)
                .ok()
                .and_then(|l| used.checked_add(l))
                .filter(|&e| e <= rest.len())
                .ok_or(NegotiationError::InvalidMessage("truncated list entry"))?;
            match Self::decode_line(&rest[used..end])? {
                Message::Protocol(p) => protocols.push(p),
                other => return Err(NegotiationError::UnexpectedMessage(format!("{other:?} in list"))),
            }
            rest = &rest[end..];
        }
        Ok(Message::List(protocols))
    }
}

fn line(text: &str) -> Bytes {
    let mut payload = Vec::with_capacity(text.len() + 1);
    payload.extend_from_slice(text.as_bytes());
    payload.push(b'\n');
    encode_frame(&payload)
}
