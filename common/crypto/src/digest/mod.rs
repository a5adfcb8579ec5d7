// Copyright 2024 - Shroud Network <dev@shroud.network>
// SPDX-License-Identifier: Apache-2.0

//! SHA-1 digests, incremental and one-shot, plus HMAC-SHA1.

use digest::Digest;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::DIGEST_LEN;

type HmacSha1 = Hmac<Sha1>;

/// Compute the SHA-1 digest of `data` in one shot.
pub fn digest(data: &[u8]) -> [u8; DIGEST_LEN] {
    Sha1::digest(data).into()
}

/// Intermediate state of a digest over a stream of data.
///
/// `Clone` yields an independent context with the same state; reading the
/// digest out does not disturb the running state, so more bytes can be
/// added afterwards.
#[derive(Clone, Default)]
pub struct DigestContext {
    inner: Sha1,
}

impl DigestContext {
    pub fn new() -> Self {
        DigestContext { inner: Sha1::new() }
    }

    /// Absorb `data` into the running digest.
    pub fn add_bytes(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Write the first `out.len()` bytes of the digest of everything
    /// absorbed so far into `out`.
    ///
    /// Finalizes a copy of the state, so the context remains usable.
    /// `out` must not exceed [`DIGEST_LEN`] bytes.
    pub fn get_digest(&self, out: &mut [u8]) {
        assert!(out.len() <= DIGEST_LEN);
        let full = self.inner.clone().finalize();
        out.copy_from_slice(&full[..out.len()]);
    }

    /// Replace this context's state with that of `other`.
    pub fn assign(&mut self, other: &DigestContext) {
        self.inner = other.inner.clone();
    }
}

/// HMAC-SHA1 (RFC 2104) of `msg` under `key`.
pub fn hmac_sha1(key: &[u8], msg: &[u8]) -> [u8; DIGEST_LEN] {
    let mut mac = HmacSha1::new_from_slice(key).expect("hmac accepts keys of any length");
    mac.update(msg);
    mac.finalize().into_bytes().into()
}
