// Copyright (c) 2026 Hopwire
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

//! Persisted node identity.
//!
//! The Ed25519 keypair lives in `<data_dir>/node_identity.key` in the
//! libp2p protobuf key encoding.

use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use libp2p::identity::Keypair;
use thiserror::Error;
use tracing::info;

use super::PeerId;

const IDENTITY_FILE: &str = "node_identity.key";

/// Identity file errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Filesystem failure.
    #[error("identity io: {0}")]
    Io(#[from] io::Error),
    /// The key file is not a protobuf-encoded keypair.
    #[error("identity decode")]
    Decode,
}

fn read_keypair(path: &Path) -> Result<Keypair, IdentityError> {
    let bytes = fs::read(path)?;
    Keypair::from_protobuf_encoding(&bytes).map_err(|_| IdentityError::Decode)
}

fn write_keypair(dir: &Path, kp: &Keypair) -> Result<(), IdentityError> {
    let bytes = kp.to_protobuf_encoding().map_err(|_| IdentityError::Decode)?;
    // tmp + rename
    let tmp = dir.join(format!("{IDENTITY_FILE}.tmp"));
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(&bytes)?;
        f.sync_all()?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600));
    }
    fs::rename(&tmp, dir.join(IDENTITY_FILE))?;
    Ok(())
}

/// Load the keypair stored under `data_dir`, generating and persisting a
/// fresh one on first start.
pub fn load_or_create_identity(data_dir: impl AsRef<Path>) -> Result<(PeerId, Keypair), IdentityError> {
    let dir = data_dir.as_ref();
    fs::create_dir_all(dir)?;

    let path = dir.join(IDENTITY_FILE);
    let kp = if path.exists() {
        read_keypair(&path)?
    } else {
        let kp = Keypair::generate_ed25519();
        write_keypair(dir, &kp)?;
        info!(path = %path.display(), "generated node identity");
        kp
    };
    Ok((PeerId::from_public_key(&kp.public()), kp))
}
