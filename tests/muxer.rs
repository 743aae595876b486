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

use std::io::ErrorKind;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use hopwire::muxer::{
    Flag, Frame, FrameKind, LogicalStream, MuxCodec, MuxConfig, MuxError, Role, Session, StreamState,
};
use proptest::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite};

fn encode(frame: Frame) -> Vec<u8> {
    let mut buf = BytesMut::new();
    MuxCodec::new(1 << 20).encode(frame, &mut buf).expect("encode");
    buf.to_vec()
}

#[test]
fn header_vectors() {
    let new = Frame { stream_id: 17, flag: Flag::NewStream, payload: Bytes::from_static(b"17") };
    assert_eq!(hex::encode(encode(new)), "88010231 37".replace(' ', ""));
    let msg = Frame { stream_id: 17, flag: Flag::MessageInitiator, payload: Bytes::new() };
    assert_eq!(hex::encode(encode(msg)), "8a0100");
    let close = Frame::control(17, FrameKind::Close, false);
    assert_eq!(hex::encode(encode(close)), "8b0100");
}

#[test]
fn decoder_waits_for_whole_frame_and_splits_batches() {
    let mut codec = MuxCodec::new(1 << 20);
    let mut wire = BytesMut::new();
    for (id, body) in [(1u64, &b"hey"[..]), (2, b""), (3, b"there")] {
        let f = Frame { stream_id: id, flag: Flag::MessageReceiver, payload: Bytes::copy_from_slice(body) };
        codec.encode(f, &mut wire).expect("encode");
    }
    let mut partial = wire.split_to(3);
    assert!(codec.decode(&mut partial).expect("partial").is_none());
    partial.unsplit(wire);

    let mut out = Vec::new();
    while let Some(f) = codec.decode(&mut partial).expect("decode") {
        out.push((f.stream_id, f.payload));
    }
    assert_eq!(out.len(), 3);
    assert_eq!(out[0], (1, Bytes::from_static(b"hey")));
    assert_eq!(out[2], (3, Bytes::from_static(b"there")));
}

#[test]
fn invalid_flag_and_oversized_frames() {
    let mut codec = MuxCodec::new(4);
    let mut bad_flag = BytesMut::from(&[0x0f, 0x00][..]);
    assert!(matches!(codec.decode(&mut bad_flag), Err(MuxError::InvalidFlag(7))));

    let mut big = BytesMut::from(&[0x0a, 0x05, 1, 2, 3, 4, 5][..]);
    assert!(matches!(codec.decode(&mut big), Err(MuxError::TooLarge { len: 5, max: 4 })));

    let f = Frame { stream_id: 1, flag: Flag::MessageInitiator, payload: Bytes::from_static(b"12345") };
    assert!(codec.encode(f, &mut BytesMut::new()).is_err());
}

#[test]
fn state_transitions() {
    use StreamState::*;
    assert_eq!(Open.on_local_close(), HalfClosedLocal);
    assert_eq!(HalfClosedLocal.on_remote_close(), Closed);
    assert_eq!(Open.on_remote_close().on_local_close(), Closed);
    assert_eq!(HalfClosedRemote.on_reset(), Reset);
    assert_eq!(Closed.on_reset(), Closed);
    assert!(HalfClosedRemote.can_write());
    assert!(!HalfClosedLocal.can_write());
}

proptest! {
    #[test]
    fn header_roundtrip(id in 0u64..(1 << 60), flag in 0u64..7, body in proptest::collection::vec(any::<u8>(), 0..64)) {
        let mut codec = MuxCodec::new(1 << 20);
        let frame = Frame { stream_id: id, flag: Flag::from_bits(flag).expect("flag"), payload: Bytes::from(body) };
        let mut buf = BytesMut::new();
        codec.encode(frame.clone(), &mut buf).expect("encode");
        prop_assert_eq!(codec.decode(&mut buf).expect("decode"), Some(frame));
        prop_assert!(buf.is_empty());
    }
}

type Side = (Session, mpsc::Receiver<LogicalStream>);

fn pair() -> (Side, Side) {
    pair_with(MuxConfig::default())
}

fn pair_with(config: MuxConfig) -> (Side, Side) {
    let (a, b) = tokio::io::duplex(64 * 1024);
    (Session::new(a, Role::Dialer, config.clone()), Session::new(b, Role::Listener, config))
}

async fn accept(rx: &mut mpsc::Receiver<LogicalStream>) -> LogicalStream {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("accept in time")
        .expect("session alive")
}

#[tokio::test]
async fn optimistic_open_delivers_early_data_first() {
    let ((dialer, _in_a), (_listener, mut in_b)) = pair();
    let mut out = dialer.open_stream().await.expect("open");
    assert_eq!(out.id() % 2, 1);
    out.write_all(b"early bytes").await.expect("write before accept");
    out.shutdown().await.expect("close");

    let mut inbound = accept(&mut in_b).await;
    assert_eq!(inbound.id(), out.id());
    let mut got = Vec::new();
    inbound.read_to_end(&mut got).await.expect("read");
    assert_eq!(got, b"early bytes");
}

#[tokio::test]
async fn listener_allocates_even_ids() {
    let ((_dialer, mut in_a), (listener, _in_b)) = pair();
    let s1 = listener.open_stream().await.expect("open");
    let s2 = listener.open_stream().await.expect("open");
    assert_eq!((s1.id(), s2.id()), (2, 4));
    assert_eq!(accept(&mut in_a).await.id(), 2);
}

#[tokio::test]
async fn half_close_keeps_other_direction() {
    let ((dialer, _in_a), (_listener, mut in_b)) = pair();
    let mut a = dialer.open_stream().await.expect("open");
    a.write_all(b"request").await.expect("write");
    a.shutdown().await.expect("half-close");
    assert_eq!(a.state(), StreamState::HalfClosedLocal);

    let mut b = accept(&mut in_b).await;
    let mut req = Vec::new();
    b.read_to_end(&mut req).await.expect("read request");
    assert_eq!(req, b"request");
    b.write_all(b"response").await.expect("write after remote close");
    b.shutdown().await.expect("close");
    assert_eq!(b.state(), StreamState::Closed);

    let mut resp = Vec::new();
    a.read_to_end(&mut resp).await.expect("read response");
    assert_eq!(resp, b"response");
    assert!(a.write_all(b"more").await.is_err());
}

#[tokio::test]
async fn reset_one_stream_leaves_siblings_alone() {
    let ((dialer, _in_a), (_listener, mut in_b)) = pair();
    let mut local = Vec::new();
    let mut remote = Vec::new();
    for _ in 0..4 {
        let mut s = dialer.open_stream().await.expect("open");
        s.write_all(b"x").await.expect("write");
        local.push(s);
        remote.push(accept(&mut in_b).await);
    }

    local[0].reset();
    let mut buf = [0u8; 1];
    // first byte may already be buffered; the reset surfaces next
    let err = loop {
        match remote[0].read(&mut buf).await {
            Ok(0) => panic!("reset must not look like a clean close"),
            Ok(_) => continue,
            Err(e) => break e,
        }
    };
    assert_eq!(err.kind(), ErrorKind::ConnectionReset);

    for (l, r) in local.iter_mut().zip(remote.iter_mut()).skip(1) {
        r.read_exact(&mut buf).await.expect("sibling data intact");
        assert_eq!(&buf, b"x");
        l.write_all(b"y").await.expect("sibling still writable");
        r.read_exact(&mut buf).await.expect("sibling still readable");
        assert_eq!(&buf, b"y");
        assert_eq!(r.state(), StreamState::Open);
    }
}

#[tokio::test]
async fn session_close_resets_every_stream() {
    let ((dialer, _in_a), (listener, mut in_b)) = pair();
    let mut local = Vec::new();
    let mut remote = Vec::new();
    for _ in 0..3 {
        local.push(dialer.open_stream().await.expect("open"));
        remote.push(accept(&mut in_b).await);
    }

    dialer.close();
    assert!(dialer.is_closed());
    assert!(matches!(dialer.open_stream().await, Err(MuxError::SessionClosed)));

    let mut buf = [0u8; 8];
    for s in local.iter_mut() {
        let err = s.read(&mut buf).await.expect_err("local reset");
        assert_eq!(err.kind(), ErrorKind::ConnectionReset);
    }
    tokio::time::timeout(Duration::from_secs(5), listener.closed()).await.expect("remote ends");
    for s in remote.iter_mut() {
        let err = s.read(&mut buf).await.expect_err("remote reset");
        assert_eq!(err.kind(), ErrorKind::ConnectionReset);
    }
}

#[tokio::test]
async fn dropping_an_open_stream_resets_the_remote() {
    let ((dialer, _in_a), (_listener, mut in_b)) = pair();
    let s = dialer.open_stream().await.expect("open");
    let mut inbound = accept(&mut in_b).await;
    drop(s);
    let mut buf = [0u8; 4];
    let err = inbound.read(&mut buf).await.expect_err("reset");
    assert_eq!(err.kind(), ErrorKind::ConnectionReset);
}

#[tokio::test]
async fn large_writes_are_chunked() {
    let ((dialer, _in_a), (_listener, mut in_b)) = pair();
    let payload = vec![7u8; 3 * (1 << 20) + 17];
    let mut out = dialer.open_stream().await.expect("open");
    let expected = payload.clone();
    let writer = tokio::spawn(async move {
        out.write_all(&payload).await.expect("write");
        out.shutdown().await.expect("close");
        out
    });
    let mut inbound = accept(&mut in_b).await;
    let mut got = Vec::new();
    inbound.read_to_end(&mut got).await.expect("read");
    assert_eq!(got.len(), expected.len());
    assert!(got == expected);
    writer.await.expect("join");
}

#[tokio::test]
async fn slow_reader_gets_everything_written_ahead() {
    let ((dialer, _in_a), (_listener, mut in_b)) = pair();
    let mut out = dialer.open_stream().await.expect("open");
    // far more frames than one stream buffers
    for _ in 0..200 {
        out.write_all(b"0123456789").await.expect("write");
    }
    out.shutdown().await.expect("close");
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut inbound = accept(&mut in_b).await;
    let mut got = Vec::new();
    inbound.read_to_end(&mut got).await.expect("read");
    assert_eq!(got.len(), 2000);
    assert!(got.chunks(10).all(|c| c == b"0123456789"));
}

#[tokio::test]
async fn writer_waits_for_a_paused_reader() {
    let config = MuxConfig { stream_buffer: 1, write_queue: 1, ..MuxConfig::default() };
    let ((dialer, _in_a), (_listener, mut in_b)) = pair_with(config);
    let mut out = dialer.open_stream().await.expect("open");
    let chunk = vec![1u8; 16 * 1024];
    let writer = tokio::spawn(async move {
        for _ in 0..64 {
            out.write_all(&chunk).await.expect("write");
        }
        out.shutdown().await.expect("close");
    });
    // one MiB cannot fit in the pipe, so the writer is still blocked
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!writer.is_finished());

    let mut inbound = accept(&mut in_b).await;
    let mut got = Vec::new();
    inbound.read_to_end(&mut got).await.expect("read");
    assert_eq!(got.len(), 64 * 16 * 1024);
    writer.await.expect("join");
}

#[tokio::test]
async fn stalled_reader_is_reset_after_the_receive_timeout() {
    let config = MuxConfig { stream_buffer: 2, receive_timeout_ms: 50, ..MuxConfig::default() };
    let ((dialer, _in_a), (_listener, mut in_b)) = pair_with(config);
    let mut out = dialer.open_stream().await.expect("open");
    for _ in 0..10 {
        out.write_all(b"x").await.expect("write");
    }
    let mut stalled = accept(&mut in_b).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut buf = [0u8; 4];
    let err = stalled.read(&mut buf).await.expect_err("reset");
    assert_eq!(err.kind(), ErrorKind::ConnectionReset);
    let err = tokio::time::timeout(Duration::from_secs(5), out.read(&mut buf))
        .await
        .expect("in time")
        .expect_err("remote reset");
    assert_eq!(err.kind(), ErrorKind::ConnectionReset);

    let mut next = dialer.open_stream().await.expect("open");
    next.write_all(b"ok").await.expect("write");
    let mut fresh = accept(&mut in_b).await;
    fresh.read_exact(&mut buf[..2]).await.expect("read");
    assert_eq!(&buf[..2], b"ok");
}

#[tokio::test]
async fn new_frame_with_a_local_id_is_reset() {
    let (a, b) = tokio::io::duplex(64 * 1024);
    let (dialer, mut inbound) = Session::new(a, Role::Dialer, MuxConfig::default());
    let (r, w) = tokio::io::split(b);
    let mut remote_in = FramedRead::new(r, MuxCodec::new(1 << 20));
    let mut remote_out = FramedWrite::new(w, MuxCodec::new(1 << 20));

    // odd ids belong to the dialer
    let bogus = Frame { stream_id: 1, flag: Flag::NewStream, payload: Bytes::from_static(b"1") };
    remote_out.send(bogus).await.expect("send");
    let reply = tokio::time::timeout(Duration::from_secs(5), remote_in.next())
        .await
        .expect("in time")
        .expect("frame")
        .expect("decode");
    assert_eq!(reply, Frame::control(1, FrameKind::Reset, false));
    assert!(inbound.try_recv().is_err());
    assert_eq!(dialer.stream_count(), 0);

    let own = dialer.open_stream().await.expect("open");
    assert_eq!(own.id(), 1);
    let new = remote_in.next().await.expect("frame").expect("decode");
    assert_eq!((new.stream_id, new.flag), (1, Flag::NewStream));
}
