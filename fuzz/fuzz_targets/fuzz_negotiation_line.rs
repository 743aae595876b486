// Copyright (c) 2026 Hopwire
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use hopwire::negotiation::Message;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = Message::decode_line(data);
    let _ = Message::decode_list(data);
});
