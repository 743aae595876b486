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

use std::net::SocketAddr;

use hopwire::multiaddr::{protocol, AddressError, Multiaddr, Protocol, Segment};
use hopwire::peer::PeerId;

const PEER: &str = "QmSswe1dCFRepmhjAMR5VfHeokGLcvVggkuDJm7RMfJSrE";
const RELAY: &str = "QmQWqGdndSpAkxfk8iyiJyz3XXGkrDNujvc8vEst3baubA";

fn ma(s: &str) -> Multiaddr {
    s.parse().expect("valid multiaddr")
}

#[test]
fn known_binary_vectors() {
    assert_eq!(hex::encode(ma("/ip4/127.0.0.1/tcp/4001").to_bytes()), "047f000001060fa1");
    assert_eq!(hex::encode(ma("/ip4/1.2.3.4/udp/0").to_bytes()), "040102030491020000");
    assert_eq!(hex::encode(ma("/p2p-circuit").to_bytes()), "a202");
    assert_eq!(hex::encode(ma("/dns4/a.io").to_bytes()), "3604612e696f");
}

#[test]
fn p2p_alias_and_numeric_codes() {
    let a = ma(&format!("/p2p/{PEER}"));
    let b = ma(&format!("/ipfs/{PEER}"));
    assert_eq!(a, b);
    assert_eq!(a.to_string(), format!("/ipfs/{PEER}"));
    assert_eq!(ma("/4/10.0.0.1/6/80"), ma("/ip4/10.0.0.1/tcp/80"));
}

#[test]
fn empty_address() {
    assert!(ma("/").is_empty());
    assert_eq!(Multiaddr::empty().to_string(), "/");
    assert!(Multiaddr::from_bytes(&[]).expect("empty").is_empty());
}

#[test]
fn unix_path_keeps_remainder() {
    let a = ma("/unix/tmp/hopwire.sock");
    assert_eq!(a.len(), 1);
    assert_eq!(a.to_string(), "/unix/tmp/hopwire.sock");
}

#[test]
fn unix_paths_without_a_text_form_are_rejected() {
    for bad in ["/tmp/", "/a//b", "//", "/"] {
        let seg = Segment::new(protocol::UNIX, bad.as_bytes().to_vec());
        assert!(matches!(seg, Err(AddressError::InvalidValue { .. })), "{bad} accepted");
    }
    let seg = Segment::new(protocol::UNIX, b"/tmp/a.sock".to_vec()).expect("plain path");
    assert_eq!(seg.value(), b"/tmp/a.sock");
    // trailing slash in text is dropped, so the bytes stay canonical
    assert_eq!(ma("/unix/tmp/a.sock/").to_bytes(), ma("/unix/tmp/a.sock").to_bytes());
}

#[test]
fn parse_errors() {
    assert_eq!("ip4/1.2.3.4".parse::<Multiaddr>(), Err(AddressError::MissingLeadingSlash));
    assert!(matches!("/ip4".parse::<Multiaddr>(), Err(AddressError::MissingValue("ip4"))));
    assert!(matches!("/ip4/300.1.1.1".parse::<Multiaddr>(), Err(AddressError::InvalidValue { .. })));
    assert!(matches!("/tcp/70000".parse::<Multiaddr>(), Err(AddressError::InvalidValue { .. })));
    assert!(matches!("/bogus/1".parse::<Multiaddr>(), Err(AddressError::UnknownProtocol(_))));
}

#[test]
fn binary_errors() {
    assert!(matches!(Multiaddr::from_bytes(b"dsfsdfsdf"), Err(AddressError::UnknownCode(100))));
    assert_eq!(Multiaddr::from_bytes(&[0x04, 0x7f, 0x00]), Err(AddressError::Truncated));
    // ipfs value whose multihash header claims more bytes than present
    let bad = [0xa5, 0x03, 0x04, 0x12, 0x20, 0xaa, 0xbb];
    assert!(matches!(Multiaddr::from_bytes(&bad), Err(AddressError::InconsistentLength("ipfs"))));
}

#[test]
fn circuit_helpers() {
    let addr = ma(&format!("/ip4/1.2.3.4/tcp/4001/ipfs/{RELAY}/p2p-circuit/ipfs/{PEER}"));
    assert!(addr.is_circuit());
    let (relay, dst) = addr.split_circuit().expect("circuit");
    assert_eq!(relay.peer_id(), Some(RELAY.parse::<PeerId>().expect("peer id")));
    assert_eq!(dst, ma(&format!("/ipfs/{PEER}")));
    assert_eq!(addr.peer_id(), Some(PEER.parse::<PeerId>().expect("peer id")));

    let bare = ma(&format!("/p2p-circuit/ipfs/{PEER}"));
    let (relay, _) = bare.split_circuit().expect("circuit");
    assert!(relay.is_empty());
    assert!(ma("/ip4/1.2.3.4/tcp/1").split_circuit().is_none());
}

#[test]
fn encapsulate_and_decapsulate() {
    let base = ma("/ip4/1.2.3.4/tcp/80");
    let full = base.encapsulate(&ma("/ws/tcp/80"));
    assert_eq!(full.to_string(), "/ip4/1.2.3.4/tcp/80/ws/tcp/80");
    assert_eq!(full.decapsulate(&ma("/tcp/80")).expect("contained"), ma("/ip4/1.2.3.4/tcp/80/ws"));
    assert_eq!(full.decapsulate_code(protocol::WS).expect("contained"), base);
    assert!(matches!(base.decapsulate(&ma("/udp/1")), Err(AddressError::NotContained(_))));
}

#[test]
fn protocols_and_socket_addrs() {
    let a = ma("/ip6/::1/udp/53");
    let names: Vec<&str> = a.protocols().iter().map(|p| p.name).collect();
    assert_eq!(names, ["ip6", "udp"]);
    assert!(a.is_thin_waist());
    let sock: SocketAddr = "[::1]:53".parse().expect("socket addr");
    assert_eq!(a.to_socket_addr(), Some(sock));
    assert_eq!(Multiaddr::from_socket_addr(sock, protocol::UDP).expect("thin waist"), a);
    assert!(!ma("/dns4/example.com/tcp/1").is_thin_waist());
    assert!(Protocol::by_name("p2p").is_some_and(|p| p.code == protocol::IPFS));
}

#[test]
fn debug_and_serde() {
    let a = ma("/ip4/127.0.0.1/tcp/4001");
    assert_eq!(format!("{a:?}"), "<Multiaddr 047f000001060fa1 - /ip4/127.0.0.1/tcp/4001>");

    #[derive(serde::Deserialize)]
    struct Doc {
        addr: Multiaddr,
    }
    let doc: Doc = toml::from_str("addr = \"/ip4/127.0.0.1/tcp/4001\"").expect("toml");
    assert_eq!(doc.addr, a);
}
