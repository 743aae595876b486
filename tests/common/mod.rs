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

#![allow(dead_code)]

//! In-memory switch: every peer pair shares one muxed session over a
//! `tokio::io::duplex` pipe.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hopwire::monitoring::metrics::Metrics;
use hopwire::muxer::{LogicalStream, MuxConfig, Role, Session};
use hopwire::negotiation::{NegotiationConfig, Router};
use hopwire::relay::{Connector, Listener, RelayBook, RelayConfig, Switch, SwitchError, RELAY_PROTOCOL};
use hopwire::stream::{BoxedStream, Connection};
use hopwire::{Multiaddr, PeerId, PeerInfo};
use tokio::sync::mpsc;

static NEXT_PORT: AtomicU16 = AtomicU16::new(4001);

pub fn random_peer_id() -> PeerId {
    let kp = libp2p::identity::Keypair::generate_ed25519();
    PeerId::from_public_key(&kp.public())
}

#[derive(Default)]
pub struct Network {
    switches: Mutex<HashMap<PeerId, Arc<MemorySwitch>>>,
}

impl Network {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lookup(&self, id: &PeerId) -> Option<Arc<MemorySwitch>> {
        self.switches.lock().unwrap().get(id).cloned()
    }

    /// Register a peer with the relay protocol mounted on its router.
    pub fn node(self: &Arc<Self>, relay: RelayConfig) -> Node {
        let id = random_peer_id();
        let port = NEXT_PORT.fetch_add(1, Ordering::Relaxed);
        let addr: Multiaddr = format!("/ip4/127.0.0.1/tcp/{port}").parse().unwrap();
        let info = PeerInfo::with_addrs(id.clone(), [addr.with_peer_id(&id)]);

        let metrics = Arc::new(Metrics::new().unwrap());
        let negotiation = NegotiationConfig::default();
        let router = Arc::new(Router::new(negotiation.clone()).with_metrics(Arc::clone(&metrics)));
        let switch = Arc::new(MemorySwitch {
            info,
            router: Arc::clone(&router),
            network: Arc::clone(self),
            sessions: Mutex::new(HashMap::new()),
        });
        self.switches.lock().unwrap().insert(id, Arc::clone(&switch));

        let book = Arc::new(RelayBook::new());
        let dyn_switch: Arc<dyn Switch> = switch.clone();
        let (listener, incoming) = Listener::create(
            dyn_switch,
            Arc::clone(&book),
            relay.clone(),
            negotiation.clone(),
            Arc::clone(&metrics),
        );
        router.add_handler(RELAY_PROTOCOL, listener.clone());

        Node { switch, router, listener, incoming, book, metrics, relay, negotiation }
    }
}

pub struct MemorySwitch {
    info: PeerInfo,
    router: Arc<Router>,
    network: Arc<Network>,
    sessions: Mutex<HashMap<PeerId, Session>>,
}

impl MemorySwitch {
    fn live_session(&self, id: &PeerId) -> Option<Session> {
        self.sessions.lock().unwrap().get(id).filter(|s| !s.is_closed()).cloned()
    }

    fn connect(&self, id: &PeerId) -> Result<Session, SwitchError> {
        let remote = self.network.lookup(id).ok_or_else(|| SwitchError::Unreachable(id.clone()))?;
        let (a, b) = tokio::io::duplex(64 * 1024);
        let (local, local_in) = Session::new(a, Role::Dialer, MuxConfig::default());
        let (theirs, their_in) = Session::new(b, Role::Listener, MuxConfig::default());
        accept_loop(Arc::clone(&self.router), local_in);
        accept_loop(Arc::clone(&remote.router), their_in);
        remote.sessions.lock().unwrap().insert(self.info.id().clone(), theirs);
        self.sessions.lock().unwrap().insert(id.clone(), local.clone());
        Ok(local)
    }

    /// Close the session to `id`, as if the connection went away.
    pub fn disconnect(&self, id: &PeerId) {
        let session = self.sessions.lock().unwrap().remove(id);
        if let Some(session) = session {
            session.close();
        }
    }
}

#[async_trait]
impl Switch for MemorySwitch {
    fn local_peer(&self) -> PeerInfo {
        self.info.clone()
    }

    fn is_connected(&self, peer: &PeerId) -> bool {
        self.live_session(peer).is_some()
    }

    async fn dial(&self, peer: &PeerInfo) -> Result<BoxedStream, SwitchError> {
        let session = match self.live_session(peer.id()) {
            Some(s) => s,
            None => self.connect(peer.id())?,
        };
        let stream: BoxedStream = Box::new(session.open_stream().await?);
        Ok(stream)
    }
}

fn accept_loop(router: Arc<Router>, mut inbound: mpsc::Receiver<LogicalStream>) {
    tokio::spawn(async move {
        while let Some(stream) = inbound.recv().await {
            let router = Arc::clone(&router);
            tokio::spawn(async move {
                let deadline = router.deadline();
                let _ = router.handle(Box::new(stream), &deadline).await;
            });
        }
    });
}

pub struct Node {
    pub switch: Arc<MemorySwitch>,
    pub router: Arc<Router>,
    pub listener: Arc<Listener>,
    pub incoming: mpsc::Receiver<Connection>,
    pub book: Arc<RelayBook>,
    pub metrics: Arc<Metrics>,
    pub relay: RelayConfig,
    pub negotiation: NegotiationConfig,
}

impl Node {
    pub fn id(&self) -> PeerId {
        self.switch.info.id().clone()
    }

    pub fn info(&self) -> PeerInfo {
        self.switch.info.clone()
    }

    /// Dialable address ending in `/ipfs/<id>`.
    pub fn addr(&self) -> Multiaddr {
        self.switch.info.addrs()[0].clone()
    }

    pub fn connector(&self) -> Connector {
        Connector::new(
            self.switch.clone(),
            Arc::clone(&self.book),
            self.relay.clone(),
            self.negotiation.clone(),
            Arc::clone(&self.metrics),
        )
    }
}

pub fn hop_relay() -> RelayConfig {
    RelayConfig { hop: true, ..RelayConfig::default() }
}
