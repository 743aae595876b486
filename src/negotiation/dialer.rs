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

//! Dialer-side driver.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::machine::{DialerEvent, DialerMachine};
use super::{read_payload, write_message, NegotiationConfig, NegotiationError};
use crate::deadline::Deadline;

/// Drives a [`DialerMachine`] over an owned stream.
///
/// The stream is read with exact frame reads, so [`Dialer::into_inner`]
/// returns it positioned right after the accepted echo.
#[derive(Debug)]
pub struct Dialer<S> {
    io: S,
    machine: DialerMachine,
    config: NegotiationConfig,
    deadline: Deadline,
    handshaken: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Dialer<S> {
    /// Wrap `io`; the default deadline is `config.timeout_ms` from now.
    pub fn new(io: S, config: &NegotiationConfig) -> Self {
        Self {
            io,
            machine: DialerMachine::new(),
            config: config.clone(),
            deadline: Deadline::after(config.timeout()),
            handshaken: false,
        }
    }

    /// Replace the deadline guarding every exchange.
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Send the header and wait for the echo.
    pub async fn handshake(&mut self) -> Result<(), NegotiationError> {
        if self.handshaken {
            return Ok(());
        }
        let hello = self.machine.start()?;
        match self.exchange(hello, self.config.max_line_len).await? {
            DialerEvent::HandshakeDone => {
                self.handshaken = true;
                Ok(())
            }
            other => Err(NegotiationError::UnexpectedMessage(format!("{other:?}"))),
        }
    }

    /// Propose exactly one protocol.
    pub async fn select(&mut self, protocol: &str) -> Result<(), NegotiationError> {
        if protocol.len() + 1 > self.config.max_line_len {
            return Err(NegotiationError::MessageTooLarge {
                len: protocol.len() as u64 + 1,
                max: self.config.max_line_len,
            });
        }
        self.handshake().await?;
        let proposal = self.machine.propose(protocol)?;
        match self.exchange(proposal, self.config.max_line_len).await? {
            DialerEvent::Accepted(p) => {
                debug!(protocol = %p, "protocol selected");
                Ok(())
            }
            DialerEvent::Rejected(p) => {
                debug!(protocol = %p, "protocol rejected");
                Err(NegotiationError::NotSupported(p))
            }
            other => Err(NegotiationError::UnexpectedMessage(format!("{other:?}"))),
        }
    }

    /// Propose each candidate in order until one is accepted.
    pub async fn select_one_of(&mut self, protocols: &[&str]) -> Result<String, NegotiationError> {
        if protocols.is_empty() {
            return Err(NegotiationError::NoProtocols);
        }
        for p in protocols {
            match self.select(p).await {
                Ok(()) => return Ok((*p).to_string()),
                Err(NegotiationError::NotSupported(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(NegotiationError::NoneSupported)
    }

    /// Ask the listener for its protocols.
    pub async fn ls(&mut self) -> Result<Vec<String>, NegotiationError> {
        self.handshake().await?;
        let req = self.machine.request_list()?;
        match self.exchange(req, self.config.max_list_len).await? {
            DialerEvent::Listed(protocols) => Ok(protocols),
            other => Err(NegotiationError::UnexpectedMessage(format!("{other:?}"))),
        }
    }

    /// Protocol agreed on, if any.
    pub fn selected(&self) -> Option<&str> {
        self.machine.selected()
    }

    /// Give the stream back.
    pub fn into_inner(self) -> S {
        self.io
    }

    async fn exchange(
        &mut self,
        msg: super::Message,
        reply_max: usize,
    ) -> Result<DialerEvent, NegotiationError> {
        let len = msg.payload_len();
        if len > self.config.max_line_len {
            return Err(NegotiationError::MessageTooLarge {
                len: len as u64,
                max: self.config.max_line_len,
            });
        }
        let deadline = self.deadline.clone();
        let io = &mut self.io;
        let payload = deadline
            .run(async move {
                write_message(io, &msg).await?;
                read_payload(io, reply_max).await
            })
            .await??;
        self.machine.on_frame(&payload)
    }
}
