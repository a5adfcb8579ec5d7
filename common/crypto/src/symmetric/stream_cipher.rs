// Copyright 2024 - Shroud Network <dev@shroud.network>
// SPDX-License-Identifier: Apache-2.0

//! The AES-128-CTR stream used for relay payloads.
//!
//! A [`StreamCipher`] owns its key buffer and the position of its counter;
//! every byte pushed through it advances the counter, in strict call
//! order. Never encrypt two messages under the same key and IV.

use aes::Aes128;
use cipher::{KeyIvInit, StreamCipher as _};
use thiserror::Error;
use zeroize::Zeroize;

use crate::random::{self, RandomError};
use crate::{CIPHER_IV_LEN, CIPHER_KEY_LEN};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("the cipher has not been initialized with a key")]
    NotInitialized,

    #[error("refusing to seal an empty message")]
    EmptyMessage,

    #[error("the ciphertext is too short to carry an IV")]
    MessageTooShort,

    #[error("output buffer of {available} bytes cannot hold {required}")]
    OutputTooShort { available: usize, required: usize },

    #[error("input and output lengths differ")]
    LengthMismatch,

    #[error(transparent)]
    Random(#[from] RandomError),
}

/// Key and stream state for the AES-128-CTR cipher.
pub struct StreamCipher {
    key: [u8; CIPHER_KEY_LEN],
    cipher: Option<Aes128Ctr>,
}

impl StreamCipher {
    /// A cipher with an all-zero key and no stream yet.
    pub fn new() -> Self {
        StreamCipher {
            key: [0u8; CIPHER_KEY_LEN],
            cipher: None,
        }
    }

    /// Copy `key` into the key buffer. Does not initialize the stream.
    pub fn set_key(&mut self, key: &[u8; CIPHER_KEY_LEN]) {
        self.key.copy_from_slice(key);
    }

    /// Fill the key buffer from the CSPRNG. Does not initialize the stream.
    pub fn generate_key(&mut self) -> Result<(), CipherError> {
        random::random_bytes(&mut self.key)?;
        Ok(())
    }

    pub fn key(&self) -> &[u8; CIPHER_KEY_LEN] {
        &self.key
    }

    /// Install the key into the stream with a zero counter block.
    pub fn encrypt_init(&mut self) {
        self.cipher = Some(Aes128Ctr::new(
            (&self.key).into(),
            (&[0u8; CIPHER_IV_LEN]).into(),
        ));
    }

    /// Identical to [`Self::encrypt_init`]: in counter mode the two
    /// directions share one keystream.
    pub fn decrypt_init(&mut self) {
        self.encrypt_init();
    }

    /// Move the counter to the block position described by `iv`.
    pub fn set_iv(&mut self, iv: &[u8; CIPHER_IV_LEN]) -> Result<(), CipherError> {
        if self.cipher.is_none() {
            return Err(CipherError::NotInitialized);
        }
        self.cipher = Some(Aes128Ctr::new((&self.key).into(), iv.into()));
        Ok(())
    }

    /// XOR keystream over `from` into `to`, advancing the counter.
    pub fn encrypt(&mut self, from: &[u8], to: &mut [u8]) -> Result<(), CipherError> {
        let cipher = self.cipher.as_mut().ok_or(CipherError::NotInitialized)?;
        cipher
            .apply_keystream_b2b(from, to)
            .map_err(|_| CipherError::LengthMismatch)
    }

    /// XOR keystream over `from` into `to`; the same operation as
    /// [`Self::encrypt`].
    pub fn decrypt(&mut self, from: &[u8], to: &mut [u8]) -> Result<(), CipherError> {
        self.encrypt(from, to)
    }

    /// XOR keystream over `buf` in place, advancing the counter.
    pub fn crypt_inplace(&mut self, buf: &mut [u8]) -> Result<(), CipherError> {
        let cipher = self.cipher.as_mut().ok_or(CipherError::NotInitialized)?;
        cipher.apply_keystream(buf);
        Ok(())
    }

    /// Seal `from` under a fresh IV: the IV is drawn from the CSPRNG,
    /// written to `to[..16]`, installed as the counter, and the ciphertext
    /// follows it. Returns the number of bytes written,
    /// `from.len() + CIPHER_IV_LEN`.
    pub fn encrypt_with_iv(&mut self, from: &[u8], to: &mut [u8]) -> Result<usize, CipherError> {
        if from.is_empty() {
            return Err(CipherError::EmptyMessage);
        }
        if to.len() < from.len() + CIPHER_IV_LEN {
            return Err(CipherError::OutputTooShort {
                available: to.len(),
                required: from.len() + CIPHER_IV_LEN,
            });
        }

        let mut iv = [0u8; CIPHER_IV_LEN];
        random::random_bytes(&mut iv)?;
        self.set_iv(&iv)?;

        let (iv_out, body) = to.split_at_mut(CIPHER_IV_LEN);
        iv_out.copy_from_slice(&iv);
        self.encrypt(from, &mut body[..from.len()])?;
        Ok(from.len() + CIPHER_IV_LEN)
    }

    /// Open an IV-prefixed envelope: the first 16 bytes of `from` become
    /// the counter, the rest decrypts into `to`. Returns the number of
    /// bytes written, `from.len() - CIPHER_IV_LEN`.
    pub fn decrypt_with_iv(&mut self, from: &[u8], to: &mut [u8]) -> Result<usize, CipherError> {
        if from.len() <= CIPHER_IV_LEN {
            return Err(CipherError::MessageTooShort);
        }
        let body_len = from.len() - CIPHER_IV_LEN;
        if to.len() < body_len {
            return Err(CipherError::OutputTooShort {
                available: to.len(),
                required: body_len,
            });
        }

        let mut iv = [0u8; CIPHER_IV_LEN];
        iv.copy_from_slice(&from[..CIPHER_IV_LEN]);
        self.set_iv(&iv)?;
        self.decrypt(&from[CIPHER_IV_LEN..], &mut to[..body_len])?;
        Ok(body_len)
    }
}

impl Default for StreamCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StreamCipher {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Set `key` and initialize the stream in one step.
pub fn create_init_cipher(key: &[u8; CIPHER_KEY_LEN]) -> StreamCipher {
    let mut cipher = StreamCipher::new();
    cipher.set_key(key);
    cipher.encrypt_init();
    cipher
}
