// Copyright 2025 - Shroud Network <dev@shroud.network>
// SPDX-License-Identifier: Apache-2.0

//! Diffie-Hellman key agreement over a fixed 1024-bit MODP group.
//!
//! The group is RFC 2409 group 2 with generator 2 and 320-bit private
//! exponents; public values travel as 128 bytes, zero-padded at the front.

use std::sync::OnceLock;

use num_bigint_dig::BigUint;
use thiserror::Error;
use tracing::warn;
use zeroize::{Zeroize, Zeroizing};

use crate::kdf::{self, KdfError};
use crate::random::{self, RandomError};
use crate::{DH_BYTES, DIGEST_LEN};

/// The 1024-bit safe prime from RFC 2409, section 6.2; supposedly it
/// equals 2^1024 - 2^960 - 1 + 2^64 * { [2^894 pi] + 129093 }.
const DH_PRIME_HEX: &[u8] = b"FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E08\
                              8A67CC74020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B\
                              302B0A6DF25F14374FE1356D6D51C245E485B576625E7EC6F44C42E9\
                              A637ED6B0BFF5CB6F406B7EDEE386BFB5A899FA5AE9F24117C4B1FE6\
                              49286651ECE65381FFFFFFFFFFFFFFFF";

const DH_PRIVATE_KEY_BITS: usize = 320;

/// Our own freshly generated public value failing the subgroup check is a
/// once-in-the-universe event; give up after this many tries.
const MAX_KEYGEN_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DhError {
    #[error("DH public value outside the safe subgroup")]
    InvalidPublicKey,

    #[error("could not generate a valid DH keypair")]
    KeyGeneration,

    #[error("output buffer of {len} bytes is smaller than the group size of {expected}")]
    BufferTooSmall { len: usize, expected: usize },

    #[error("requested {requested} bytes of shared key material, more than the KDF can deliver")]
    OutputTooLong { requested: usize },

    #[error(transparent)]
    Random(#[from] RandomError),

    #[error(transparent)]
    Kdf(#[from] KdfError),
}

fn dh_params() -> &'static (BigUint, BigUint) {
    static PARAMS: OnceLock<(BigUint, BigUint)> = OnceLock::new();
    PARAMS.get_or_init(|| {
        let p = BigUint::parse_bytes(DH_PRIME_HEX, 16).expect("the group prime is well formed");
        (p, BigUint::from(2u32))
    })
}

/// Accept `bn` iff it lies in `[2, p-2]`.
///
/// Everything outside that range either leaks the shared secret outright
/// or confines it to a tiny subgroup.
pub fn check_dh_key(bn: &BigUint) -> Result<(), DhError> {
    let (p, _) = dh_params();
    let one = BigUint::from(1u32);

    if *bn <= one {
        warn!("DH key must be at least 2.");
        return Err(reject(bn));
    }
    if *bn >= p - &one {
        warn!("DH key must be at most p-2.");
        return Err(reject(bn));
    }
    Ok(())
}

fn reject(bn: &BigUint) -> DhError {
    warn!("Rejecting insecure DH key [{}]", bn.to_str_radix(16));
    DhError::InvalidPublicKey
}

/// Our half (x, g^x) of a DH handshake, waiting for the peer's g^y.
///
/// The keypair is created lazily by the first operation that needs it.
pub struct DhExchange {
    private_key: Option<BigUint>,
    public_key: Option<BigUint>,
}

impl DhExchange {
    pub fn new() -> Self {
        DhExchange {
            private_key: None,
            public_key: None,
        }
    }

    /// The group modulus size in bytes.
    pub fn get_bytes(&self) -> usize {
        let (p, _) = dh_params();
        (p.bits() + 7) / 8
    }

    /// Generate (x, g^x), validating our own public value and retrying on
    /// the astronomically unlikely failure.
    pub fn generate_public(&mut self) -> Result<(), DhError> {
        for attempt in 0..MAX_KEYGEN_ATTEMPTS {
            let (x, gx) = generate_keypair()?;
            if check_dh_key(&gx).is_ok() {
                self.private_key = Some(x);
                self.public_key = Some(gx);
                return Ok(());
            }
            warn!(
                "Weird! Our own DH key was invalid (attempt {}). I guess \
                 once-in-the-universe chances really do happen. Trying again.",
                attempt + 1
            );
        }
        Err(DhError::KeyGeneration)
    }

    /// Write g^x, generating it if necessary, into `out` as an unsigned
    /// big-endian value left-padded with zeros. `out` must hold at least
    /// [`DH_BYTES`] bytes.
    pub fn get_public(&mut self, out: &mut [u8]) -> Result<(), DhError> {
        if out.len() < DH_BYTES {
            return Err(DhError::BufferTooSmall {
                len: out.len(),
                expected: DH_BYTES,
            });
        }
        if self.public_key.is_none() {
            self.generate_public()?;
        }
        let public_key = self.public_key.as_ref().expect("generated just above");

        let bytes = public_key.to_bytes_be();
        out.fill(0);
        let offset = out.len() - bytes.len();
        out[offset..].copy_from_slice(&bytes);
        Ok(())
    }

    /// Agree on `out_len` bytes of key material with the peer that sent
    /// `peer_public` (unsigned big-endian g^y).
    ///
    /// The shared g^xy is stretched with the counter-mode SHA-1 KDF, so
    /// `out_len / 20` may not exceed 255.
    pub fn compute_secret(
        &mut self,
        peer_public: &[u8],
        out_len: usize,
    ) -> Result<Vec<u8>, DhError> {
        if out_len / DIGEST_LEN > 255 {
            return Err(DhError::OutputTooLong { requested: out_len });
        }

        let peer = BigUint::from_bytes_be(peer_public);
        check_dh_key(&peer).map_err(|err| {
            warn!("Rejected invalid g^x");
            err
        })?;

        if self.private_key.is_none() {
            self.generate_public()?;
        }
        let x = self.private_key.as_ref().expect("generated just above");

        let (p, _) = dh_params();
        let shared = Zeroizing::new(peer.modpow(x, p));
        // minimal big-endian form, no left padding
        let shared_bytes = Zeroizing::new(shared.to_bytes_be());

        Ok(kdf::expand_key_material(&shared_bytes, out_len)?)
    }
}

impl Default for DhExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DhExchange {
    fn drop(&mut self) {
        if let Some(x) = self.private_key.as_mut() {
            x.zeroize();
        }
    }
}

fn generate_keypair() -> Result<(BigUint, BigUint), DhError> {
    let (p, g) = dh_params();

    // 40 fresh bytes give an exponent of at most 320 bits.
    let mut buf = Zeroizing::new([0u8; DH_PRIVATE_KEY_BITS / 8]);
    random::random_bytes(&mut *buf)?;
    let x = BigUint::from_bytes_be(&*buf);
    let gx = g.modpow(&x, p);
    Ok((x, gx))
}
