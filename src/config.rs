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

//! Node configuration file (TOML).

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::monitoring::logging::LogFormat;
use crate::multiaddr::Multiaddr;
use crate::muxer::MuxConfig;
use crate::negotiation::NegotiationConfig;
use crate::relay::RelayConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("config read failed")]
    Read,
    /// File is not valid TOML for this schema.
    #[error("config parse failed: {0}")]
    Parse(String),
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// `[node]` section.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NodeSection {
    /// Display name used in logs.
    pub name: String,
    /// Directory holding the persisted identity.
    pub data_dir: String,
    /// Addresses the switch listens on.
    pub listen_addrs: Vec<Multiaddr>,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            name: "hopwire".to_string(),
            data_dir: "./data".to_string(),
            listen_addrs: Vec::new(),
            log_format: LogFormat::Compact,
        }
    }
}

/// Whole configuration file.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NodeConfig {
    /// `[node]`.
    pub node: NodeSection,
    /// `[negotiation]`.
    pub negotiation: NegotiationConfig,
    /// `[mux]`.
    pub mux: MuxConfig,
    /// `[relay]`.
    pub relay: RelayConfig,
}

impl NodeConfig {
    /// Read, parse and validate `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|_| ConfigError::Read)?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: NodeConfig = toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject zero limits and relay addresses without a peer id.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.negotiation.timeout_ms == 0 {
            return Err(ConfigError::Invalid("negotiation.timeout_ms must be > 0"));
        }
        if self.negotiation.max_line_len == 0 || self.negotiation.max_list_len == 0 {
            return Err(ConfigError::Invalid("negotiation limits must be > 0"));
        }
        if self.mux.max_frame_len == 0
            || self.mux.stream_buffer == 0
            || self.mux.receive_timeout_ms == 0
            || self.mux.write_queue == 0
            || self.mux.accept_backlog == 0
        {
            return Err(ConfigError::Invalid("mux limits must be > 0"));
        }
        if self.relay.handshake_timeout_ms == 0
            || self.relay.max_message_len == 0
            || self.relay.max_addr_len == 0
        {
            return Err(ConfigError::Invalid("relay limits must be > 0"));
        }
        if self.relay.relays.iter().any(|a| a.peer_id().is_none()) {
            return Err(ConfigError::Invalid("relay address without /ipfs/<id>"));
        }
        Ok(())
    }
}
