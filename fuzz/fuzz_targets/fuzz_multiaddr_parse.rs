// Copyright (c) 2026 Hopwire
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use hopwire::Multiaddr;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(addr) = Multiaddr::from_bytes(data) {
        let _ = addr.to_string();
        let _ = addr.split_circuit();
        assert_eq!(Multiaddr::from_bytes(&addr.to_bytes()).ok(), Some(addr));
    }
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(addr) = s.parse::<Multiaddr>() {
            assert_eq!(Multiaddr::from_bytes(&addr.to_bytes()).ok(), Some(addr));
        }
    }
});
