// Copyright 2024 - Shroud Network <dev@shroud.network>
// SPDX-License-Identifier: Apache-2.0

//! Text encodings used across the directory and control formats: hex,
//! base32 (RFC 3548 subset) and the line-folded base64 envelope form.

use thiserror::Error;

pub mod base16;
pub mod base32;
pub mod base64;

pub use base16::{base16_decode, base16_encode};
pub use base32::{base32_decode, base32_encode};
pub use base64::{base64_decode, base64_encode, digest_from_base64, digest_to_base64};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("input length {len} is not valid for this encoding")]
    InvalidLength { len: usize },

    #[error("illegal character {byte:#04x} at position {pos}")]
    IllegalCharacter { byte: u8, pos: usize },

    #[error("encoded input ends with a dangling 6-bit group")]
    TrailingBits,
}
