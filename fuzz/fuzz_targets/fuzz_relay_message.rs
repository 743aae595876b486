// Copyright (c) 2026 Hopwire
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use arbitrary::Arbitrary;
use hopwire::relay::validate::{validate_message, Phase};
use hopwire::relay::{CircuitRelay, Peer};
use libfuzzer_sys::fuzz_target;
use prost::Message;

#[derive(Clone, Debug, Arbitrary)]
struct Input {
    raw: Vec<u8>,
    kind: Option<i32>,
    src: Option<(Vec<u8>, Vec<Vec<u8>>)>,
    dst: Option<(Vec<u8>, Vec<Vec<u8>>)>,
    code: Option<i32>,
    max_addr_len: u16,
}

fn check(msg: &CircuitRelay, max_addr_len: usize) {
    let _ = msg.message_type();
    let _ = msg.status_code();
    let _ = validate_message(msg, Phase::Hop, max_addr_len);
    let _ = validate_message(msg, Phase::Stop, max_addr_len);
}

fuzz_target!(|inp: Input| {
    let max_addr_len = usize::from(inp.max_addr_len);
    if let Ok(msg) = CircuitRelay::decode(inp.raw.as_slice()) {
        check(&msg, max_addr_len);
    }

    let peer = |(id, addrs): (Vec<u8>, Vec<Vec<u8>>)| Peer { id, addrs };
    let msg = CircuitRelay {
        r#type: inp.kind,
        src_peer: inp.src.map(peer),
        dst_peer: inp.dst.map(peer),
        code: inp.code,
    };
    check(&msg, max_addr_len);
    let wire = msg.encode_to_vec();
    assert_eq!(CircuitRelay::decode(wire.as_slice()).ok(), Some(msg));
});
