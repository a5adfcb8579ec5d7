// Copyright 2024 - Shroud Network <dev@shroud.network>
// SPDX-License-Identifier: Apache-2.0

use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

use pem::Pem;
use shroud_crypto::asymmetric::rsa::{KeyError, PublicKey};
use thiserror::Error;
use tracing::info;

use crate::pathfinder::PathFinder;

const PRIVATE_KEY_TAG: &str = "RSA PRIVATE KEY";
const PUBLIC_KEY_TAG: &str = "RSA PUBLIC KEY";

#[derive(Debug, Error)]
pub enum PemStoreError {
    #[error("could not access the key file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed PEM: {0}")]
    Pem(#[from] pem::PemError),

    #[error("unexpected PEM tag {found:?}, expected {expected:?}")]
    UnexpectedTag {
        found: String,
        expected: &'static str,
    },

    #[error("the key material is unusable: {0}")]
    MalformedKey(#[from] KeyError),
}

/// Read a private key from a PEM file. A freshly loaded private key is
/// also run through the full RSA sanity check before it is handed out.
pub fn read_private_key<P: AsRef<Path>>(path: P) -> Result<PublicKey, PemStoreError> {
    let pem = read_pem_file(path.as_ref())?;
    check_tag(&pem, PRIVATE_KEY_TAG)?;
    let key = PublicKey::from_private_der(pem.contents())?;
    key.check_key()?;
    Ok(key)
}

/// Write the private half of `key` to `path`, PEM-encoded. Any missing
/// parent directories are created.
pub fn write_private_key<P: AsRef<Path>>(key: &PublicKey, path: P) -> Result<(), PemStoreError> {
    let der = key.to_private_der()?;
    write_pem_file(path.as_ref(), der.to_vec(), PRIVATE_KEY_TAG)?;
    info!("Written private key to {:?}", path.as_ref());
    Ok(())
}

/// Read a public key from a PEM file.
pub fn read_public_key<P: AsRef<Path>>(path: P) -> Result<PublicKey, PemStoreError> {
    let pem = read_pem_file(path.as_ref())?;
    check_tag(&pem, PUBLIC_KEY_TAG)?;
    Ok(PublicKey::asn1_decode(pem.contents())?)
}

/// Write the public half of `key` to `path`, PEM-encoded.
pub fn write_public_key<P: AsRef<Path>>(key: &PublicKey, path: P) -> Result<(), PemStoreError> {
    write_pem_file(path.as_ref(), key.asn1_encode()?, PUBLIC_KEY_TAG)?;
    info!("Written public key to {:?}", path.as_ref());
    Ok(())
}

/// Key persistence bound to a [`PathFinder`].
pub struct PemStore<P> {
    pathfinder: P,
}

impl<P: PathFinder> PemStore<P> {
    pub fn new(pathfinder: P) -> Self {
        PemStore { pathfinder }
    }

    /// Load the node identity from its private-key file.
    pub fn read_identity(&self) -> Result<PublicKey, PemStoreError> {
        read_private_key(self.pathfinder.private_identity_key())
    }

    /// Persist the node identity: the private key and its public half.
    pub fn write_identity(&self, key: &PublicKey) -> Result<(), PemStoreError> {
        write_private_key(key, self.pathfinder.private_identity_key())?;
        write_public_key(key, self.pathfinder.public_identity_key())?;
        Ok(())
    }
}

fn check_tag(pem: &Pem, expected: &'static str) -> Result<(), PemStoreError> {
    if pem.tag() != expected {
        return Err(PemStoreError::UnexpectedTag {
            found: pem.tag().to_string(),
            expected,
        });
    }
    Ok(())
}

fn read_pem_file(path: &Path) -> Result<Pem, PemStoreError> {
    let mut buf = Vec::new();
    File::open(path)?.read_to_end(&mut buf)?;
    Ok(pem::parse(&buf)?)
}

fn write_pem_file(path: &Path, data: Vec<u8>, tag: &str) -> Result<(), PemStoreError> {
    // ensure the whole directory structure exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pem = Pem::new(tag, data);
    let encoded =
        pem::encode_config(&pem, pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF));

    let mut file = File::create(path)?;
    file.write_all(encoded.as_bytes())?;
    Ok(())
}
