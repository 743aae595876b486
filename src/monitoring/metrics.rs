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
#![warn(missing_docs)]

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registration or encoding failed.
    #[error("prometheus")]
    Prom,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Completed listener-side negotiations.
    pub negotiations_total: IntCounter,
    /// Negotiations that ended in an error.
    pub negotiation_failures_total: IntCounter,

    /// HOP requests received.
    pub relay_hop_total: IntCounter,
    /// HOP requests answered with a failure status.
    pub relay_hop_rejected_total: IntCounter,
    /// STOP requests received.
    pub relay_stop_total: IntCounter,
    /// STOP requests answered with a failure status.
    pub relay_stop_rejected_total: IntCounter,
    /// Circuits currently being spliced.
    pub relay_circuits_active: IntGauge,
    /// Bytes forwarded by finished splices (both directions).
    pub relay_spliced_bytes_total: IntCounter,

    /// Dial attempts through a relay.
    pub relay_dial_attempts_total: IntCounter,
    /// Dial attempts through a relay that failed.
    pub relay_dial_failures_total: IntCounter,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, MetricsError> {
    let c = IntCounter::new(name, help).map_err(|_| MetricsError::Prom)?;
    registry
        .register(Box::new(c.clone()))
        .map_err(|_| MetricsError::Prom)?;
    Ok(c)
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let negotiations_total =
            counter(&registry, "hopwire_negotiations_total", "Completed negotiations")?;
        let negotiation_failures_total = counter(
            &registry,
            "hopwire_negotiation_failures_total",
            "Failed negotiations",
        )?;

        let relay_hop_total = counter(&registry, "hopwire_relay_hop_total", "HOP requests")?;
        let relay_hop_rejected_total = counter(
            &registry,
            "hopwire_relay_hop_rejected_total",
            "HOP requests rejected",
        )?;
        let relay_stop_total = counter(&registry, "hopwire_relay_stop_total", "STOP requests")?;
        let relay_stop_rejected_total = counter(
            &registry,
            "hopwire_relay_stop_rejected_total",
            "STOP requests rejected",
        )?;

        let relay_circuits_active =
            IntGauge::new("hopwire_relay_circuits_active", "Circuits being spliced")
                .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(relay_circuits_active.clone()))
            .map_err(|_| MetricsError::Prom)?;

        let relay_spliced_bytes_total = counter(
            &registry,
            "hopwire_relay_spliced_bytes_total",
            "Bytes forwarded by relay splices",
        )?;
        let relay_dial_attempts_total = counter(
            &registry,
            "hopwire_relay_dial_attempts_total",
            "Dial attempts through relays",
        )?;
        let relay_dial_failures_total = counter(
            &registry,
            "hopwire_relay_dial_failures_total",
            "Failed dial attempts through relays",
        )?;

        Ok(Self {
            registry,
            negotiations_total,
            negotiation_failures_total,
            relay_hop_total,
            relay_hop_rejected_total,
            relay_stop_total,
            relay_stop_rejected_total,
            relay_circuits_active,
            relay_spliced_bytes_total,
            relay_dial_attempts_total,
            relay_dial_failures_total,
        })
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn gather_text(&self) -> Result<String, MetricsError> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(|_| MetricsError::Prom)?;
        String::from_utf8(buf).map_err(|_| MetricsError::Prom)
    }
}
