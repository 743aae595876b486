// Copyright (c) 2026 Hopwire
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use bytes::BytesMut;
use hopwire::muxer::MuxCodec;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    let mut codec = MuxCodec::new(64 * 1024);
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_frame)) = codec.decode(&mut buf) {}
});
