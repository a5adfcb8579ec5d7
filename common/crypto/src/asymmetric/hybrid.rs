// Copyright 2025 - Shroud Network <dev@shroud.network>
// SPDX-License-Identifier: Apache-2.0

//! Hybrid public-key encryption: one RSA block carrying a symmetric key
//! and the head of the message, followed by the rest of the message under
//! AES-CTR.
//!
//! This envelope is protocol-specific; it is neither RSA-KEM nor an
//! OAEP-hybrid construction, and its byte layout must not change.

use thiserror::Error;
use zeroize::Zeroizing;

use crate::asymmetric::rsa::{KeyError, Padding, PublicKey};
use crate::random::{self, RandomError};
use crate::symmetric::stream_cipher::{self, CipherError};
use crate::CIPHER_KEY_LEN;

#[derive(Debug, Error)]
pub enum HybridError {
    #[error("a {len}-byte message cannot be sealed without padding under a {keysize}-byte key")]
    MessageTooShort { len: usize, keysize: usize },

    #[error("the RSA block came out as {len} bytes instead of {keysize}")]
    MalformedRsaBlock { len: usize, keysize: usize },

    #[error("decrypted RSA block of {len} bytes has no room for a symmetric key")]
    NoSymmetricKey { len: usize },

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Random(#[from] RandomError),
}

/// Encrypt `from` to the holder of `key`.
///
/// A message short enough to fit in one padded RSA block is sent as that
/// single block (unless `force` demands the hybrid form); anything longer
/// becomes `RSA(symkey || head) || AES-CTR(tail)`. A message that fits
/// entirely inside the RSA block has no tail for the symmetric key to act
/// on, so `force` only changes the outcome past that point.
pub fn hybrid_encrypt(
    key: &PublicKey,
    from: &[u8],
    padding: Padding,
    force: bool,
) -> Result<Vec<u8>, HybridError> {
    let overhead = padding.overhead();
    let pkeylen = key.keysize();

    if padding == Padding::No && from.len() < pkeylen {
        return Err(HybridError::MessageTooShort {
            len: from.len(),
            keysize: pkeylen,
        });
    }

    // Bytes of message the RSA block carries alongside the symmetric key.
    let prefix_len = pkeylen - overhead - CIPHER_KEY_LEN;

    if from.len() + overhead <= pkeylen && (!force || from.len() <= prefix_len) {
        // It all fits in a single encrypt.
        return Ok(key.public_encrypt(from, padding)?);
    }

    let mut symkey = Zeroizing::new([0u8; CIPHER_KEY_LEN]);
    random::random_bytes(&mut *symkey)?;
    // An unpadded RSA plaintext must stay numerically below the modulus,
    // so without padding the symmetric key loses its top bit.
    if padding == Padding::No {
        symkey[0] &= 0x7f;
    }
    let mut cipher = stream_cipher::create_init_cipher(&symkey);

    let mut buf = Zeroizing::new(Vec::with_capacity(pkeylen));
    buf.extend_from_slice(&*symkey);
    buf.extend_from_slice(&from[..prefix_len]);

    let rsa_block = key.public_encrypt(&buf, padding)?;
    if rsa_block.len() != pkeylen {
        return Err(HybridError::MalformedRsaBlock {
            len: rsa_block.len(),
            keysize: pkeylen,
        });
    }

    let tail = &from[prefix_len..];
    let mut out = vec![0u8; pkeylen + tail.len()];
    out[..pkeylen].copy_from_slice(&rsa_block);
    cipher.encrypt(tail, &mut out[pkeylen..])?;
    Ok(out)
}

/// Invert [`hybrid_encrypt`].
pub fn hybrid_decrypt(
    key: &PublicKey,
    from: &[u8],
    padding: Padding,
    warn_on_failure: bool,
) -> Result<Vec<u8>, HybridError> {
    let pkeylen = key.keysize();

    if from.len() <= pkeylen {
        return Ok(key.private_decrypt(from, padding, warn_on_failure)?);
    }

    let buf = Zeroizing::new(key.private_decrypt(&from[..pkeylen], padding, warn_on_failure)?);
    if buf.len() < CIPHER_KEY_LEN {
        return Err(HybridError::NoSymmetricKey { len: buf.len() });
    }

    let mut symkey = Zeroizing::new([0u8; CIPHER_KEY_LEN]);
    symkey.copy_from_slice(&buf[..CIPHER_KEY_LEN]);
    let mut cipher = stream_cipher::create_init_cipher(&symkey);

    let head_len = buf.len() - CIPHER_KEY_LEN;
    let mut out = vec![0u8; head_len + (from.len() - pkeylen)];
    out[..head_len].copy_from_slice(&buf[CIPHER_KEY_LEN..]);
    cipher.decrypt(&from[pkeylen..], &mut out[head_len..])?;
    Ok(out)
}
