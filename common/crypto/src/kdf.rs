// Copyright 2025 - Shroud Network <dev@shroud.network>
// SPDX-License-Identifier: Apache-2.0

//! Key derivation: counter-mode SHA-1 expansion and RFC 2440 S2K.

use thiserror::Error;
use zeroize::Zeroizing;

use crate::digest::{self, DigestContext};
use crate::{DIGEST_LEN, S2K_SPECIFIER_LEN};

/// Asking for more than this repeats digest blocks, so it is a caller error.
pub const MAX_EXPAND_OUT_LEN: usize = DIGEST_LEN * 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KdfError {
    #[error("requested {requested} bytes of key material, the maximum is {max}")]
    OutputTooLong { requested: usize, max: usize },
}

/// Expand `key_in` ("K") into `out_len` bytes of key material by taking
/// the leading bytes of `H(K || [00]) || H(K || [01]) || ...`.
pub fn expand_key_material(key_in: &[u8], out_len: usize) -> Result<Vec<u8>, KdfError> {
    if out_len > MAX_EXPAND_OUT_LEN {
        return Err(KdfError::OutputTooLong {
            requested: out_len,
            max: MAX_EXPAND_OUT_LEN,
        });
    }

    let mut tmp = Zeroizing::new(Vec::with_capacity(key_in.len() + 1));
    tmp.extend_from_slice(key_in);
    tmp.push(0u8);
    let counter_at = key_in.len();

    let mut out = Vec::with_capacity(out_len);
    let mut counter = 0u32;
    while out.len() < out_len {
        tmp[counter_at] = counter as u8;
        let block = Zeroizing::new(digest::digest(&tmp));
        let take = DIGEST_LEN.min(out_len - out.len());
        out.extend_from_slice(&block[..take]);
        counter += 1;
    }

    Ok(out)
}

/// RFC 2440-style iterated-salted string-to-key.
///
/// The first 8 bytes of `s2k_specifier` are the salt; the 9th encodes the
/// iteration count as `(16 + (c & 15)) << ((c >> 4) + 6)`. The salted
/// secret is absorbed into a single SHA-1 context over and over until
/// `count` bytes have been consumed, the last round taking only the prefix
/// it still needs.
pub fn secret_to_key(
    secret: &[u8],
    s2k_specifier: &[u8; S2K_SPECIFIER_LEN],
    key_out_len: usize,
) -> Result<Vec<u8>, KdfError> {
    if key_out_len > DIGEST_LEN {
        return Err(KdfError::OutputTooLong {
            requested: key_out_len,
            max: DIGEST_LEN,
        });
    }

    let c = s2k_specifier[8];
    let mut count = (16usize + (c & 15) as usize) << ((c >> 4) + 6);

    let mut input = Zeroizing::new(Vec::with_capacity(8 + secret.len()));
    input.extend_from_slice(&s2k_specifier[..8]);
    input.extend_from_slice(secret);

    let mut ctx = DigestContext::new();
    while count > 0 {
        if count >= input.len() {
            ctx.add_bytes(&input);
            count -= input.len();
        } else {
            ctx.add_bytes(&input[..count]);
            count = 0;
        }
    }

    let mut out = vec![0u8; key_out_len];
    ctx.get_digest(&mut out);
    Ok(out)
}
