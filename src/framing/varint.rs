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

//! Unsigned LEB128 varints (multiformats `unsigned-varint`).

use bytes::BufMut;
use thiserror::Error;

/// Longest encoding of a `u64`.
pub const MAX_LEN: usize = 10;

/// Varint decode errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VarintError {
    /// Buffer ended before the terminating byte.
    #[error("varint incomplete")]
    Incomplete,
    /// Value does not fit in 64 bits.
    #[error("varint overflow")]
    Overflow,
}

/// Append the encoding of `v` to `out`.
pub fn encode_into(mut v: u64, out: &mut impl BufMut) {
    while v >= 0x80 {
        out.put_u8((v as u8 & 0x7f) | 0x80);
        v >>= 7;
    }
    out.put_u8(v as u8);
}

/// Encode `v` into a fresh buffer.
pub fn encode(v: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(v));
    encode_into(v, &mut out);
    out
}

/// Number of bytes `encode(v)` produces.
pub fn encoded_len(v: u64) -> usize {
    let bits = 64 - (v | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Decode a varint at the start of `buf`, returning `(value, bytes consumed)`.
pub fn decode(buf: &[u8]) -> Result<(u64, usize), VarintError> {
    let mut v: u64 = 0;
    for (i, &b) in buf.iter().take(MAX_LEN).enumerate() {
        if i == MAX_LEN - 1 && b > 0x01 {
            return Err(VarintError::Overflow);
        }
        v |= u64::from(b & 0x7f) << (7 * i);
        if b & 0x80 == 0 {
            return Ok((v, i + 1));
        }
    }
    if buf.len() >= MAX_LEN {
        Err(VarintError::Overflow)
    } else {
        Err(VarintError::Incomplete)
    }
}
