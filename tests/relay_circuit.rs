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

mod common;

use std::io::ErrorKind;
use std::time::Duration;

use common::{hop_relay, random_peer_id, Network, Node};
use hopwire::deadline::Deadline;
use hopwire::relay::{RelayConfig, RelayError, Status, Switch};
use hopwire::stream::{Connection, ConnectionKind, Endpoint};
use hopwire::{Multiaddr, PeerInfo};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn circuit_via(relay: &Node, dst: &Node) -> Multiaddr {
    format!("{}/p2p-circuit/ipfs/{}", relay.addr(), dst.id()).parse().unwrap()
}

/// Destination registered with the relay through `listen`.
async fn announced(net: &std::sync::Arc<Network>, relay: &Node) -> Node {
    let dst = net.node(RelayConfig { relays: vec![relay.addr()], ..RelayConfig::default() });
    let accepted = dst.listener.listen(&Deadline::after(Duration::from_secs(5))).await;
    assert_eq!(accepted, vec![relay.id()]);
    dst
}

#[tokio::test]
async fn bytes_flow_both_ways_through_a_relay() {
    let net = Network::new();
    let relay = net.node(hop_relay());
    let mut dst = announced(&net, &relay).await;
    let src = net.node(RelayConfig::default());
    assert!(relay.switch.is_connected(&dst.id()));

    let addr = circuit_via(&relay, &dst);
    let mut out = src
        .connector()
        .connect(&addr, &Deadline::after(Duration::from_secs(5)))
        .await
        .expect("relayed dial");
    assert_eq!(out.kind(), ConnectionKind::Relayed);
    assert_eq!(out.remote_peer(), Some(&dst.id()));
    assert_eq!(out.remote_addr(), Some(&addr));

    let mut inbound = tokio::time::timeout(Duration::from_secs(5), dst.incoming.recv())
        .await
        .expect("in time")
        .expect("relayed connection");
    assert_eq!(inbound.kind(), ConnectionKind::Relayed);
    assert_eq!(inbound.remote_peer(), Some(&src.id()));

    out.write_all(b"ping").await.expect("write");
    let mut buf = [0u8; 4];
    inbound.read_exact(&mut buf).await.expect("read");
    assert_eq!(&buf, b"ping");

    inbound.write_all(b"pong").await.expect("write back");
    out.read_exact(&mut buf).await.expect("read back");
    assert_eq!(&buf, b"pong");

    out.shutdown().await.expect("close");
    let mut rest = Vec::new();
    inbound.read_to_end(&mut rest).await.expect("eof");
    assert!(rest.is_empty());

    assert_eq!(relay.metrics.relay_hop_total.get(), 1);
    assert_eq!(dst.metrics.relay_stop_total.get(), 1);
    assert_eq!(relay.metrics.relay_circuits_active.get(), 1);

    inbound.shutdown().await.expect("close back");
    out.read_to_end(&mut rest).await.expect("eof back");
    assert!(rest.is_empty());
    circuits_released(&relay).await;
    assert_eq!(relay.metrics.relay_spliced_bytes_total.get(), 8);
}

async fn circuits_released(relay: &Node) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while relay.metrics.relay_circuits_active.get() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("relay frees the circuit");
}

async fn open_circuit(net: &std::sync::Arc<Network>) -> (Node, Node, Connection, Connection) {
    let relay = net.node(hop_relay());
    let mut dst = announced(net, &relay).await;
    let src = net.node(RelayConfig::default());
    let out = src
        .connector()
        .connect(&circuit_via(&relay, &dst), &Deadline::after(Duration::from_secs(5)))
        .await
        .expect("relayed dial");
    let inbound = tokio::time::timeout(Duration::from_secs(5), dst.incoming.recv())
        .await
        .expect("in time")
        .expect("relayed connection");
    (relay, dst, out, inbound)
}

#[tokio::test]
async fn dropping_one_end_tears_down_the_circuit() {
    let net = Network::new();
    let (relay, _dst, mut out, inbound) = open_circuit(&net).await;
    assert_eq!(relay.metrics.relay_circuits_active.get(), 1);

    drop(inbound);
    let mut buf = [0u8; 8];
    let err = tokio::time::timeout(Duration::from_secs(5), out.read(&mut buf))
        .await
        .expect("in time")
        .expect_err("reset reaches the source");
    assert_eq!(err.kind(), ErrorKind::ConnectionReset);
    circuits_released(&relay).await;
}

#[tokio::test]
async fn resetting_the_source_reaches_the_destination() {
    let net = Network::new();
    let (relay, _dst, mut out, mut inbound) = open_circuit(&net).await;

    out.write_all(b"partial").await.expect("write");
    let mut buf = [0u8; 7];
    inbound.read_exact(&mut buf).await.expect("read");
    drop(out);

    let err = tokio::time::timeout(Duration::from_secs(5), inbound.read(&mut buf))
        .await
        .expect("in time")
        .expect_err("reset reaches the destination");
    assert_eq!(err.kind(), ErrorKind::ConnectionReset);
    circuits_released(&relay).await;
}

#[tokio::test]
async fn slow_destination_pauses_the_splice() {
    let net = Network::new();
    let (relay, _dst, mut out, mut inbound) = open_circuit(&net).await;

    // thousands of frames, well past every per-stream buffer on the path
    let chunk: Vec<u8> = (0..128u8).collect();
    let writer = tokio::spawn(async move {
        for _ in 0..2048 {
            out.write_all(&chunk).await.expect("write");
        }
        out.shutdown().await.expect("close");
        out
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut got = Vec::new();
    inbound.read_to_end(&mut got).await.expect("read everything");
    assert_eq!(got.len(), 2048 * 128);
    assert!(got.chunks(128).all(|c| c.iter().copied().eq(0..128u8)));
    let _out = writer.await.expect("join");
    assert_eq!(relay.metrics.relay_circuits_active.get(), 1);
}

#[tokio::test]
async fn known_relays_are_used_without_an_explicit_relay_part() {
    let net = Network::new();
    let relay = net.node(hop_relay());
    let mut dst = announced(&net, &relay).await;
    let src = net.node(RelayConfig::default());

    let connector = src.connector();
    assert!(connector.can_hop(&relay.info(), &Deadline::none()).await.expect("can hop"));
    assert!(src.book.contains(&relay.id()));

    let addr: Multiaddr = format!("/p2p-circuit/ipfs/{}", dst.id()).parse().unwrap();
    let mut out = connector.connect(&addr, &Deadline::none()).await.expect("relayed dial");
    let mut inbound = dst.incoming.recv().await.expect("relayed connection");

    out.write_all(b"hello").await.expect("write");
    let mut buf = [0u8; 5];
    inbound.read_exact(&mut buf).await.expect("read");
    assert_eq!(&buf, b"hello");
}

#[tokio::test]
async fn failing_relay_is_skipped_for_the_next_one() {
    let net = Network::new();
    let dead = net.node(hop_relay());
    let relay = net.node(hop_relay());
    let mut dst = announced(&net, &relay).await;
    let src = net.node(RelayConfig::default());

    // `dead` hops but has no connection to the destination.
    src.book.insert(dead.info());
    src.book.insert(relay.info());

    let addr: Multiaddr = format!("/p2p-circuit/ipfs/{}", dst.id()).parse().unwrap();
    let conn = src.connector().connect(&addr, &Deadline::none()).await.expect("second relay");
    assert_eq!(conn.remote_peer(), Some(&dst.id()));
    assert!(dst.incoming.recv().await.is_some());
    assert_eq!(src.metrics.relay_dial_attempts_total.get(), 2);
    assert_eq!(src.metrics.relay_dial_failures_total.get(), 1);
}

#[tokio::test]
async fn relay_status_is_surfaced_to_the_caller() {
    let net = Network::new();
    let relay = net.node(hop_relay());
    let dst = net.node(RelayConfig::default());
    let src = net.node(RelayConfig::default());

    let err = src
        .connector()
        .dial_via(&relay.info(), &dst.info(), &Deadline::none())
        .await
        .expect_err("no connection to destination");
    assert!(matches!(err, RelayError::Status(Status::HopNoConnToDst)));
}

#[tokio::test]
async fn destination_refusing_stop_fails_the_hop() {
    let net = Network::new();
    let relay = net.node(hop_relay());
    let dst = net.node(RelayConfig { stop: false, ..RelayConfig::default() });
    // connect relay and destination directly
    relay.switch.dial(&dst.info()).await.expect("dial");
    let src = net.node(RelayConfig::default());

    let err = src
        .connector()
        .dial_via(&relay.info(), &dst.info(), &Deadline::none())
        .await
        .expect_err("stop refused");
    assert!(matches!(err, RelayError::Status(Status::StopRelayRefused)));
}

#[tokio::test]
async fn no_relay_available() {
    let net = Network::new();
    let src = net.node(RelayConfig::default());
    let dst = random_peer_id();
    let addr: Multiaddr = format!("/p2p-circuit/ipfs/{dst}").parse().unwrap();
    let err = src.connector().connect(&addr, &Deadline::none()).await.expect_err("no relays");
    assert!(matches!(err, RelayError::NoRelayAvailable));

    // a relay that is itself the destination is not a candidate
    src.book.insert(PeerInfo::new(dst));
    let err = src.connector().connect(&addr, &Deadline::none()).await.expect_err("no relays");
    assert!(matches!(err, RelayError::NoRelayAvailable));
}

#[tokio::test]
async fn address_shape_errors() {
    let net = Network::new();
    let src = net.node(RelayConfig::default());
    let connector = src.connector();

    let plain: Multiaddr = "/ip4/127.0.0.1/tcp/4001".parse().unwrap();
    assert!(matches!(
        connector.connect(&plain, &Deadline::none()).await,
        Err(RelayError::InvalidCircuitAddress(_))
    ));

    let anonymous: Multiaddr = "/p2p-circuit/ip4/127.0.0.1/tcp/4001".parse().unwrap();
    assert!(matches!(
        connector.connect(&anonymous, &Deadline::none()).await,
        Err(RelayError::MissingPeerId(_))
    ));
}

#[tokio::test]
async fn cancelled_dial_stops_early() {
    let net = Network::new();
    let relay = net.node(hop_relay());
    let dst = announced(&net, &relay).await;
    let src = net.node(RelayConfig::default());

    let deadline = Deadline::none();
    deadline.cancel();
    let err = src
        .connector()
        .connect(&circuit_via(&relay, &dst), &deadline)
        .await
        .expect_err("cancelled");
    assert!(err.is_interrupt());
}

#[tokio::test]
async fn listen_skips_relays_that_refuse() {
    let net = Network::new();
    let plain = net.node(RelayConfig::default());
    let relay = net.node(hop_relay());
    let missing = random_peer_id();
    let ghost: Multiaddr = format!("/ip4/10.9.9.9/tcp/1/ipfs/{missing}").parse().unwrap();

    let dst = net.node(RelayConfig {
        relays: vec![plain.addr(), ghost, relay.addr()],
        ..RelayConfig::default()
    });
    let accepted = dst.listener.listen(&Deadline::none()).await;
    assert_eq!(accepted, vec![relay.id()]);
    assert!(dst.book.contains(&relay.id()));
    assert!(!dst.book.contains(&plain.id()));

    let addrs = dst.listener.addresses();
    assert_eq!(addrs.len(), 1);
    assert!(addrs[0].is_circuit());
    assert_eq!(addrs[0].peer_id(), Some(dst.id()));
}
