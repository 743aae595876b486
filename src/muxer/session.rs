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

//! Muxed session: reader and writer tasks plus the stream table.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::frame::{Frame, FrameKind, MuxCodec};
use super::stream::{update, LogicalStream, SharedState, StreamState};
use super::{MuxConfig, MuxError};

/// Which side of the physical connection we are. The dialer allocates odd
/// stream ids, the listener even ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Opened the physical connection.
    Dialer,
    /// Accepted the physical connection.
    Listener,
}

struct Entry {
    tx: Option<mpsc::Sender<Bytes>>,
    state: SharedState,
}

pub(crate) struct Shared {
    config: MuxConfig,
    role: Role,
    next_id: AtomicU64,
    streams: Mutex<HashMap<u64, Entry>>,
    writer: mpsc::Sender<Frame>,
    shutdown: CancellationToken,
}

impl Shared {
    pub(crate) fn writer(&self) -> mpsc::Sender<Frame> {
        self.writer.clone()
    }

    pub(crate) fn max_frame_len(&self) -> usize {
        self.config.max_frame_len
    }

    pub(crate) fn forget(&self, id: u64) {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
    }

    /// Queue a control frame from a synchronous context.
    pub(crate) fn send_control(&self, frame: Frame) {
        match self.writer.try_send(frame) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(frame)) => {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    let writer = self.writer.clone();
                    handle.spawn(async move {
                        let _ = writer.send(frame).await;
                    });
                }
            }
        }
    }

    /// Ids the remote may open: even for a dialer, odd for a listener.
    fn is_remote_id(&self, id: u64) -> bool {
        match self.role {
            Role::Dialer => id % 2 == 0,
            Role::Listener => id % 2 == 1,
        }
    }

    fn register(&self, id: u64, initiator: bool, shared: &Arc<Shared>) -> LogicalStream {
        let (tx, rx) = mpsc::channel(self.config.stream_buffer.max(1));
        let state: SharedState = Arc::new(Mutex::new(StreamState::Open));
        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Entry { tx: Some(tx), state: Arc::clone(&state) });
        LogicalStream::new(id, initiator, state, rx, Arc::clone(shared))
    }

    /// Reset every live stream and stop both tasks.
    fn teardown(&self) {
        self.shutdown.cancel();
        let drained: Vec<(u64, Entry)> =
            self.streams.lock().unwrap_or_else(PoisonError::into_inner).drain().collect();
        for (id, entry) in drained {
            if update(&entry.state, StreamState::on_reset) == StreamState::Reset {
                debug!(stream_id = id, "stream reset by session end");
            }
        }
    }

    fn reset_inbound(&self, id: u64, state: &SharedState, initiator: bool) {
        update(state, StreamState::on_reset);
        self.forget(id);
        self.send_control(Frame::control(id, FrameKind::Reset, initiator));
    }
}

/// Handle to a muxed session. Clones share the session.
///
/// The session runs until [`Session::close`] is called or the physical
/// connection ends; either way every live logical stream is reset.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
    role: Role,
}

impl Session {
    /// Take ownership of `io` and spawn the reader and writer tasks.
    ///
    /// Must be called from within a tokio runtime. Streams opened by the
    /// remote arrive on the returned receiver.
    pub fn new<S>(io: S, role: Role, config: MuxConfig) -> (Self, mpsc::Receiver<LogicalStream>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (write_tx, write_rx) = mpsc::channel(config.write_queue.max(1));
        let (accept_tx, accept_rx) = mpsc::channel(config.accept_backlog.max(1));
        let first_id = match role {
            Role::Dialer => 1,
            Role::Listener => 2,
        };
        let codec = MuxCodec::new(config.max_frame_len);
        let shared = Arc::new(Shared {
            config,
            role,
            next_id: AtomicU64::new(first_id),
            streams: Mutex::new(HashMap::new()),
            writer: write_tx,
            shutdown: CancellationToken::new(),
        });

        let (r, w) = tokio::io::split(io);
        tokio::spawn(write_loop(FramedWrite::new(w, codec.clone()), write_rx, Arc::clone(&shared)));
        tokio::spawn(read_loop(FramedRead::new(r, codec), accept_tx, Arc::clone(&shared)));

        (Self { shared, role }, accept_rx)
    }

    /// Our side of the connection.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Open a stream. Returns before the remote acknowledges; data written
    /// right away is delivered after the NEW frame.
    pub async fn open_stream(&self) -> Result<LogicalStream, MuxError> {
        if self.is_closed() {
            return Err(MuxError::SessionClosed);
        }
        let id = self.shared.next_id.fetch_add(2, Ordering::Relaxed);
        let stream = self.shared.register(id, true, &self.shared);
        let new = Frame {
            stream_id: id,
            flag: super::Flag::NewStream,
            payload: Bytes::from(id.to_string()),
        };
        if self.shared.writer.send(new).await.is_err() {
            return Err(MuxError::SessionClosed);
        }
        debug!(stream_id = id, "stream opened");
        Ok(stream)
    }

    /// Number of live logical streams.
    pub fn stream_count(&self) -> usize {
        self.shared.streams.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True once the session ended.
    pub fn is_closed(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Resolves when the session ends.
    pub async fn closed(&self) {
        self.shared.shutdown.cancelled().await;
    }

    /// End the session, resetting every live stream.
    pub fn close(&self) {
        if !self.is_closed() {
            info!(role = ?self.role, "session closed");
        }
        self.shared.teardown();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.role)
            .field("streams", &self.stream_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn write_loop<S>(
    mut framed: FramedWrite<WriteHalf<S>, MuxCodec>,
    mut rx: mpsc::Receiver<Frame>,
    shared: Arc<Shared>,
) where
    S: AsyncRead + AsyncWrite,
{
    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            next = rx.recv() => {
                let Some(frame) = next else { break };
                if let Err(e) = framed.send(frame).await {
                    warn!(error = %e, "mux write failed");
                    break;
                }
            }
        }
    }
    shared.teardown();
}

async fn read_loop<S>(
    mut framed: FramedRead<ReadHalf<S>, MuxCodec>,
    accept_tx: mpsc::Sender<LogicalStream>,
    shared: Arc<Shared>,
) where
    S: AsyncRead + AsyncWrite,
{
    loop {
        let next = tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            next = framed.next() => next,
        };
        match next {
            Some(Ok(frame)) => dispatch(&shared, &accept_tx, frame).await,
            Some(Err(e)) => {
                warn!(error = %e, "mux read failed");
                break;
            }
            None => {
                debug!("mux connection ended");
                break;
            }
        }
    }
    shared.teardown();
}

async fn dispatch(shared: &Arc<Shared>, accept_tx: &mpsc::Sender<LogicalStream>, frame: Frame) {
    let id = frame.stream_id;
    let kind = frame.flag.kind();
    match kind {
        FrameKind::New => accept_new(shared, accept_tx, id),
        FrameKind::Data => deliver(shared, frame).await,
        FrameKind::Close => {
            let mut streams = shared.streams.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(entry) = streams.get_mut(&id) else {
                debug!(stream_id = id, ?kind, "frame for unknown stream");
                return;
            };
            entry.tx = None;
            if update(&entry.state, StreamState::on_remote_close) == StreamState::Closed {
                streams.remove(&id);
            }
            debug!(stream_id = id, "remote half-close");
        }
        FrameKind::Reset => {
            let mut streams = shared.streams.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(entry) = streams.remove(&id) else {
                debug!(stream_id = id, ?kind, "frame for unknown stream");
                return;
            };
            update(&entry.state, StreamState::on_reset);
            debug!(stream_id = id, "remote reset");
        }
    }
}

fn accept_new(shared: &Arc<Shared>, accept_tx: &mpsc::Sender<LogicalStream>, id: u64) {
    if !shared.is_remote_id(id) {
        warn!(stream_id = id, "NEW frame with a locally allocated id, resetting");
        shared.send_control(Frame::control(id, FrameKind::Reset, false));
        return;
    }
    let exists = shared.streams.lock().unwrap_or_else(PoisonError::into_inner).contains_key(&id);
    if exists {
        warn!(stream_id = id, "duplicate NEW frame ignored");
        return;
    }
    let stream = shared.register(id, false, shared);
    match accept_tx.try_send(stream) {
        Ok(()) => debug!(stream_id = id, "inbound stream"),
        Err(TrySendError::Full(mut stream)) | Err(TrySendError::Closed(mut stream)) => {
            warn!(stream_id = id, "accept backlog full, resetting stream");
            stream.reset();
        }
    }
}

/// Hand a data frame to its stream. A full buffer holds up the reader until
/// the stream drains or the receive timeout passes.
async fn deliver(shared: &Arc<Shared>, frame: Frame) {
    let id = frame.stream_id;
    if frame.payload.is_empty() {
        return;
    }
    let (tx, state) = {
        let streams = shared.streams.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = streams.get(&id) else {
            debug!(stream_id = id, "data for unknown stream");
            return;
        };
        let Some(tx) = entry.tx.clone() else {
            debug!(stream_id = id, "data after remote close dropped");
            return;
        };
        (tx, Arc::clone(&entry.state))
    };
    let initiator = frame.flag == super::Flag::MessageReceiver;
    let payload = match tx.try_send(frame.payload) {
        Ok(()) | Err(TrySendError::Closed(_)) => return,
        Err(TrySendError::Full(payload)) => payload,
    };
    debug!(stream_id = id, "stream buffer full, pausing reader");
    let delivered = tokio::select! {
        _ = shared.shutdown.cancelled() => return,
        sent = tokio::time::timeout(shared.config.receive_timeout(), tx.send(payload)) => sent.is_ok(),
    };
    if !delivered {
        warn!(stream_id = id, "stream reader stalled, resetting");
        shared.reset_inbound(id, &state, initiator);
    }
}
