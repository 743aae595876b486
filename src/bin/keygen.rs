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

use anyhow::Result;
use hopwire::config::NodeConfig;
use hopwire::monitoring::logging;
use hopwire::peer::identity::load_or_create_identity;
use hopwire::peer::PeerInfo;
use hopwire::relay::circuit_addresses;

fn main() -> Result<()> {
    let cfg = match std::env::args().nth(1) {
        Some(path) => NodeConfig::load(&path)?,
        None => NodeConfig::default(),
    };
    logging::init(cfg.node.log_format);

    let (peer_id, _kp) = load_or_create_identity(&cfg.node.data_dir)?;
    tracing::info!(node = %cfg.node.name, peer = %peer_id, "identity ready");

    println!("{peer_id}");
    let local = PeerInfo::with_addrs(peer_id, cfg.node.listen_addrs.iter().cloned());
    for addr in circuit_addresses(&local) {
        println!("{addr}");
    }
    Ok(())
}
