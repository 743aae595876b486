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

//! Application protocol negotiation (multistream-select 1.0.0).
//!
//! Every line on the wire is `varint(len) || utf8 text || '\n'`. The dialer
//! sends the header, waits for the echo, then proposes protocol ids one at a
//! time; the listener echoes an accepted id or answers `na`.
//!
//! The exchange itself lives in sans-io machines ([`machine`]) so it can be
//! driven and tested without a socket. [`Dialer`] and [`Router`] drive them
//! over any `AsyncRead + AsyncWrite` stream under a [`Deadline`].
//!
//! [`Deadline`]: crate::deadline::Deadline

pub mod dialer;
pub mod machine;
pub mod matcher;
pub mod message;
pub mod router;

use serde::Deserialize;
use thiserror::Error;

use crate::deadline::Interrupted;
use crate::framing::FramingError;

pub use dialer::Dialer;
pub use machine::{DialerEvent, DialerMachine, ListenerMachine, ListenerStep, Registry};
pub use matcher::{semver_match, Matcher};
pub use message::{Message, PROTOCOL_ID};
pub use router::{channel_handler, ProtocolHandler, Router};

/// Negotiation errors.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// Underlying stream failed or closed mid-handshake.
    #[error("framing: {0}")]
    Framing(#[from] FramingError),
    /// A line exceeded the configured cap.
    #[error("message too large: {len} > {max}")]
    MessageTooLarge {
        /// Observed length.
        len: u64,
        /// Cap.
        max: usize,
    },
    /// A line was not newline terminated or not UTF-8.
    #[error("invalid message: {0}")]
    InvalidMessage(&'static str),
    /// The listener echoed a different protocol than proposed.
    #[error("protocol mismatch: proposed {proposed}, got {got}")]
    ProtocolMismatch {
        /// What we proposed.
        proposed: String,
        /// What came back.
        got: String,
    },
    /// The listener answered `na`.
    #[error("protocol not supported: {0}")]
    NotSupported(String),
    /// Every candidate was answered `na`.
    #[error("none of the proposed protocols is supported")]
    NoneSupported,
    /// Empty candidate list.
    #[error("no protocols to propose")]
    NoProtocols,
    /// A message arrived that is not valid in the current state.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),
    /// The caller's cancellation token fired.
    #[error("cancelled")]
    Cancelled,
    /// The caller's deadline passed.
    #[error("timed out")]
    TimedOut,
}

impl NegotiationError {
    /// The remote completed the exchange and turned the protocol down (or
    /// spoke something else). Transport failures and interrupts are not
    /// refusals.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            Self::NotSupported(_)
                | Self::NoneSupported
                | Self::ProtocolMismatch { .. }
                | Self::InvalidMessage(_)
                | Self::MessageTooLarge { .. }
                | Self::UnexpectedMessage(_)
        )
    }
}

impl From<Interrupted> for NegotiationError {
    fn from(i: Interrupted) -> Self {
        match i {
            Interrupted::Cancelled => Self::Cancelled,
            Interrupted::TimedOut => Self::TimedOut,
        }
    }
}

/// Negotiation limits.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NegotiationConfig {
    /// Default per-negotiation deadline.
    pub timeout_ms: u64,
    /// Largest accepted line, trailing newline included.
    pub max_line_len: usize,
    /// Largest accepted `ls` response.
    pub max_list_len: usize,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000, max_line_len: 1024, max_list_len: 64 * 1024 }
    }
}

impl NegotiationConfig {
    /// Default deadline as a duration.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

/// Read one frame of at most `max` bytes, reporting oversize as
/// [`NegotiationError::MessageTooLarge`].
pub(crate) async fn read_payload<R>(r: &mut R, max: usize) -> Result<bytes::Bytes, NegotiationError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    crate::framing::read_frame(r, max).await.map_err(|e| match e {
        FramingError::TooLarge { len, max } => NegotiationError::MessageTooLarge { len, max },
        e => NegotiationError::Framing(e),
    })
}

/// Write an encoded message and flush.
pub(crate) async fn write_message<W>(w: &mut W, msg: &Message) -> Result<(), NegotiationError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    use tokio::io::AsyncWriteExt;
    w.write_all(&msg.encode()).await.map_err(FramingError::from)?;
    w.flush().await.map_err(FramingError::from)?;
    Ok(())
}
