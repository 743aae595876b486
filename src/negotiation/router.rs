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

//! Listener-side driver and handler table.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::machine::{ListenerMachine, ListenerStep, Registry};
use super::matcher::Matcher;
use super::message::Message;
use super::{read_payload, write_message, NegotiationConfig, NegotiationError};
use crate::deadline::Deadline;
use crate::monitoring::metrics::Metrics;
use crate::stream::BoxedStream;

/// Receives a stream once a protocol has been agreed on.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// Take ownership of `stream`, which now speaks `protocol`.
    async fn handle(&self, protocol: String, stream: BoxedStream);
}

struct ChannelHandler {
    tx: mpsc::Sender<(String, BoxedStream)>,
}

#[async_trait]
impl ProtocolHandler for ChannelHandler {
    async fn handle(&self, protocol: String, stream: BoxedStream) {
        if self.tx.send((protocol, stream)).await.is_err() {
            debug!("handler channel closed, dropping stream");
        }
    }
}

/// Handler that forwards negotiated streams into a channel.
pub fn channel_handler(
    capacity: usize,
) -> (Arc<dyn ProtocolHandler>, mpsc::Receiver<(String, BoxedStream)>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Arc::new(ChannelHandler { tx }), rx)
}

struct Route {
    protocol: String,
    matcher: Matcher,
    handler: Arc<dyn ProtocolHandler>,
}

impl Registry for [Route] {
    fn lookup(&self, proposal: &str) -> Option<usize> {
        self.iter().position(|r| r.matcher.matches(&r.protocol, proposal))
    }

    fn protocols(&self) -> Vec<String> {
        self.iter().map(|r| r.protocol.clone()).collect()
    }
}

/// Handler table plus the listener loop.
///
/// The table is consulted at proposal time, so handlers added while a
/// negotiation is in flight are visible to its next proposal.
pub struct Router {
    routes: RwLock<Vec<Route>>,
    config: NegotiationConfig,
    metrics: Option<Arc<Metrics>>,
}

impl Router {
    /// Empty table.
    pub fn new(config: NegotiationConfig) -> Self {
        Self { routes: RwLock::new(Vec::new()), config, metrics: None }
    }

    /// Count negotiations in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register an exact-match handler, replacing any previous one.
    pub fn add_handler(&self, protocol: impl Into<String>, handler: Arc<dyn ProtocolHandler>) {
        self.add_handler_with(protocol, Matcher::Exact, handler);
    }

    /// Register a handler with a custom matcher, replacing any previous one.
    pub fn add_handler_with(
        &self,
        protocol: impl Into<String>,
        matcher: Matcher,
        handler: Arc<dyn ProtocolHandler>,
    ) {
        let protocol = protocol.into();
        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        routes.retain(|r| r.protocol != protocol);
        routes.push(Route { protocol, matcher, handler });
    }

    /// Unregister; returns whether something was removed.
    pub fn remove_handler(&self, protocol: &str) -> bool {
        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        let before = routes.len();
        routes.retain(|r| r.protocol != protocol);
        routes.len() != before
    }

    /// Registered protocol ids in registration order.
    pub fn protocols(&self) -> Vec<String> {
        self.routes.read().unwrap_or_else(PoisonError::into_inner).protocols()
    }

    /// Limits in use.
    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    /// Default deadline for one negotiation.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.config.timeout())
    }

    /// Run the listener side on `io` until a handler is chosen.
    pub async fn negotiate<S>(
        &self,
        io: &mut S,
        deadline: &Deadline,
    ) -> Result<(String, Arc<dyn ProtocolHandler>), NegotiationError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        deadline.run(self.listen_loop(io)).await?
    }

    async fn listen_loop<S>(
        &self,
        io: &mut S,
    ) -> Result<(String, Arc<dyn ProtocolHandler>), NegotiationError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut machine = ListenerMachine::new();
        loop {
            let payload = read_payload(io, self.config.max_line_len).await?;
            let (reply, accepted) = {
                let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);
                match machine.on_frame(&payload, &routes[..])? {
                    ListenerStep::Reply(msg) => (msg, None),
                    ListenerStep::Accept { protocol, index } => (
                        Message::Protocol(protocol.clone()),
                        Some((protocol, Arc::clone(&routes[index].handler))),
                    ),
                }
            };
            if reply == Message::Na {
                debug!("proposal rejected");
            }
            write_message(io, &reply).await?;
            if let Some(accepted) = accepted {
                return Ok(accepted);
            }
        }
    }

    /// Negotiate on `stream` and hand it to the chosen handler.
    ///
    /// On failure only this stream is dropped.
    pub async fn handle(
        &self,
        mut stream: BoxedStream,
        deadline: &Deadline,
    ) -> Result<String, NegotiationError> {
        match self.negotiate(&mut stream, deadline).await {
            Ok((protocol, handler)) => {
                if let Some(m) = &self.metrics {
                    m.negotiations_total.inc();
                }
                debug!(protocol = %protocol, "protocol accepted");
                handler.handle(protocol.clone(), stream).await;
                Ok(protocol)
            }
            Err(e) => {
                if let Some(m) = &self.metrics {
                    m.negotiation_failures_total.inc();
                }
                warn!(error = %e, "negotiation failed");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("protocols", &self.protocols())
            .field("config", &self.config)
            .finish()
    }
}
