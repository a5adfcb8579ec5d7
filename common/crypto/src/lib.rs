// Copyright 2024 - Shroud Network <dev@shroud.network>
// SPDX-License-Identifier: Apache-2.0

//! A small, uniform surface over the cryptography a shroud node needs:
//! RSA keys, AES-128-CTR streams, SHA-1 digests, Diffie-Hellman over a
//! fixed MODP group, a seeded CSPRNG, and the text encodings used by the
//! directory and wire formats.
//!
//! Call [`initialize`] once before anything else; every other operation
//! assumes the process-wide state (most importantly the seeded generator)
//! is in place.

pub mod asymmetric;
pub mod digest;
pub mod encoding;
pub mod global;
pub mod kdf;
pub mod random;
pub mod symmetric;

pub use global::{initialize, teardown, Acceleration};

/// Length of a SHA-1 digest in bytes.
pub const DIGEST_LEN: usize = 20;
/// Length of a hex-encoded digest.
pub const HEX_DIGEST_LEN: usize = 40;
/// Length of a key fingerprint: hex digest grouped in fours with spaces.
pub const FINGERPRINT_LEN: usize = 49;
/// Length of the short base64 form of a digest (no padding, no newline).
pub const BASE64_DIGEST_LEN: usize = 27;
/// Symmetric cipher key length in bytes.
pub const CIPHER_KEY_LEN: usize = 16;
/// Symmetric cipher IV length in bytes.
pub const CIPHER_IV_LEN: usize = 16;
/// Size of a DH public value (and of the group modulus) in bytes.
pub const DH_BYTES: usize = 128;
/// Size of an RSA key modulus in bytes.
pub const PK_BYTES: usize = 128;
/// Length of an RFC 2440 S2K specifier: 8 salt bytes plus a count byte.
pub const S2K_SPECIFIER_LEN: usize = 9;
