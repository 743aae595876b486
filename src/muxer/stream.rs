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

//! Logical streams and their state transitions.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{ready, Context, Poll};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;
use tokio_util::sync::PollSender;
use tracing::debug;

use super::frame::{Frame, FrameKind};
use super::session::Shared;

/// Per-stream state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// Both directions open.
    Open,
    /// We closed our write side.
    HalfClosedLocal,
    /// The remote closed its write side.
    HalfClosedRemote,
    /// Both sides closed cleanly.
    Closed,
    /// Aborted by either side or by session end.
    Reset,
}

impl StreamState {
    /// After we send CLOSE.
    pub fn on_local_close(self) -> Self {
        match self {
            StreamState::Open => StreamState::HalfClosedLocal,
            StreamState::HalfClosedRemote => StreamState::Closed,
            s => s,
        }
    }

    /// After the remote's CLOSE.
    pub fn on_remote_close(self) -> Self {
        match self {
            StreamState::Open => StreamState::HalfClosedRemote,
            StreamState::HalfClosedLocal => StreamState::Closed,
            s => s,
        }
    }

    /// After a RESET in either direction. Clean closes stay closed.
    pub fn on_reset(self) -> Self {
        match self {
            StreamState::Closed => StreamState::Closed,
            _ => StreamState::Reset,
        }
    }

    /// We may still send data.
    pub fn can_write(self) -> bool {
        matches!(self, StreamState::Open | StreamState::HalfClosedRemote)
    }

    /// Nothing more will happen on this stream.
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Closed | StreamState::Reset)
    }
}

pub(crate) type SharedState = Arc<Mutex<StreamState>>;

pub(crate) fn load(state: &SharedState) -> StreamState {
    *state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn update(state: &SharedState, f: impl FnOnce(StreamState) -> StreamState) -> StreamState {
    let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    *guard = f(*guard);
    *guard
}

/// One logical duplex stream of a [`Session`](super::Session).
///
/// `poll_shutdown` sends CLOSE (half-close). Reads after a RESET fail with
/// [`io::ErrorKind::ConnectionReset`]. Dropping a stream whose write side is
/// still open resets it.
pub struct LogicalStream {
    id: u64,
    initiator: bool,
    state: SharedState,
    rx: mpsc::Receiver<Bytes>,
    pending: Bytes,
    tx: PollSender<Frame>,
    session: Arc<Shared>,
}

impl LogicalStream {
    pub(crate) fn new(
        id: u64,
        initiator: bool,
        state: SharedState,
        rx: mpsc::Receiver<Bytes>,
        session: Arc<Shared>,
    ) -> Self {
        let tx = PollSender::new(session.writer());
        Self { id, initiator, state, rx, pending: Bytes::new(), tx, session }
    }

    /// Stream id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this side opened the stream.
    pub fn is_initiator(&self) -> bool {
        self.initiator
    }

    /// Current state.
    pub fn state(&self) -> StreamState {
        load(&self.state)
    }

    /// Abort the stream in both directions, discarding buffered data.
    pub fn reset(&mut self) {
        let prev = load(&self.state);
        if prev.is_terminal() {
            return;
        }
        update(&self.state, StreamState::on_reset);
        self.pending.clear();
        self.session.forget(self.id);
        self.session.send_control(Frame::control(self.id, FrameKind::Reset, self.initiator));
        debug!(stream_id = self.id, "stream reset");
    }

    fn reset_error() -> io::Error {
        io::Error::new(io::ErrorKind::ConnectionReset, "stream reset")
    }
}

impl std::fmt::Debug for LogicalStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicalStream")
            .field("id", &self.id)
            .field("initiator", &self.initiator)
            .field("state", &self.state())
            .finish()
    }
}

impl AsyncRead for LogicalStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            if load(&self.state) == StreamState::Reset {
                return Poll::Ready(Err(Self::reset_error()));
            }
            if !self.pending.is_empty() {
                let n = self.pending.len().min(buf.remaining());
                buf.put_slice(&self.pending[..n]);
                self.pending.advance(n);
                return Poll::Ready(Ok(()));
            }
            match ready!(self.rx.poll_recv(cx)) {
                Some(chunk) => self.pending = chunk,
                None => {
                    if load(&self.state) == StreamState::Reset {
                        return Poll::Ready(Err(Self::reset_error()));
                    }
                    return Poll::Ready(Ok(()));
                }
            }
        }
    }
}

impl AsyncWrite for LogicalStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match load(&self.state) {
            StreamState::Reset => return Poll::Ready(Err(Self::reset_error())),
            s if !s.can_write() => {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream closed")))
            }
            _ => {}
        }
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        if ready!(self.tx.poll_reserve(cx)).is_err() {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "session closed")));
        }
        let n = buf.len().min(self.session.max_frame_len());
        let mut frame = Frame::control(self.id, FrameKind::Data, self.initiator);
        frame.payload = Bytes::copy_from_slice(&buf[..n]);
        if self.tx.send_item(frame).is_err() {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "session closed")));
        }
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if !load(&self.state).can_write() {
            return Poll::Ready(Ok(()));
        }
        if ready!(self.tx.poll_reserve(cx)).is_err() {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "session closed")));
        }
        let frame = Frame::control(self.id, FrameKind::Close, self.initiator);
        if self.tx.send_item(frame).is_err() {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "session closed")));
        }
        let id = self.id;
        if update(&self.state, StreamState::on_local_close) == StreamState::Closed {
            self.session.forget(id);
        }
        debug!(stream_id = id, "stream half-closed");
        Poll::Ready(Ok(()))
    }
}

impl Drop for LogicalStream {
    fn drop(&mut self) {
        match load(&self.state) {
            StreamState::Open | StreamState::HalfClosedRemote => self.reset(),
            StreamState::HalfClosedLocal => self.session.forget(self.id),
            StreamState::Closed | StreamState::Reset => {}
        }
    }
}
